//! Gallery store: known identities and their reference embeddings.
//!
//! The persisted artifact is JSON holding two parallel lists,
//! `{"embeddings": [[f32, ...], ...], "names": ["alice", ...]}`.
//! A [`Gallery`] is immutable once built; updates produce a new value.

use crate::types::{Embedding, GalleryEntry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Every way a gallery artifact can be unusable. Any of these is fatal at startup.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery artifact unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("gallery artifact unparsable: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("gallery has {embeddings} embeddings but {names} names")]
    LengthMismatch { embeddings: usize, names: usize },
    #[error("embedding {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("embedding {index} is empty")]
    EmptyEmbedding { index: usize },
    #[error("gallery embeddings are {gallery}-dimensional but the recognizer produces {model}")]
    ModelDimensionMismatch { gallery: usize, model: usize },
}

#[derive(Debug, Serialize, Deserialize)]
struct GalleryArtifact {
    embeddings: Vec<Vec<f32>>,
    names: Vec<String>,
}

/// Ordered, immutable list of known faces. Duplicate identities are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from entries, checking that every embedding has the same non-zero dimension.
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Result<Self, GalleryError> {
        let mut expected = None;
        for (index, entry) in entries.iter().enumerate() {
            let dim = entry.embedding.dim();
            if dim == 0 {
                return Err(GalleryError::EmptyEmbedding { index });
            }
            match expected {
                None => expected = Some(dim),
                Some(expected) if expected != dim => {
                    return Err(GalleryError::DimensionMismatch {
                        index,
                        expected,
                        actual: dim,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(Self { entries })
    }

    /// Load a gallery artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GalleryError> {
        let path = path.as_ref();
        let raw = std::fs::read(path)?;
        let gallery = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            entries = gallery.len(),
            dim = gallery.dim().unwrap_or(0),
            "loaded gallery"
        );
        Ok(gallery)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, GalleryError> {
        let artifact: GalleryArtifact = serde_json::from_slice(raw)?;
        if artifact.embeddings.len() != artifact.names.len() {
            return Err(GalleryError::LengthMismatch {
                embeddings: artifact.embeddings.len(),
                names: artifact.names.len(),
            });
        }
        let entries = artifact
            .embeddings
            .into_iter()
            .zip(artifact.names)
            .map(|(values, identity)| GalleryEntry {
                identity,
                embedding: Embedding::new(values),
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, GalleryError> {
        let artifact = GalleryArtifact {
            embeddings: self
                .entries
                .iter()
                .map(|e| e.embedding.values.clone())
                .collect(),
            names: self.entries.iter().map(|e| e.identity.clone()).collect(),
        };
        Ok(serde_json::to_vec_pretty(&artifact)?)
    }

    /// Write the artifact next to `path` and rename it into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GalleryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, self.to_json()?)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), entries = self.len(), "saved gallery");
        Ok(())
    }

    /// A new gallery with one more entry appended; `self` is left untouched.
    pub fn with_entry(
        &self,
        identity: impl Into<String>,
        embedding: Embedding,
    ) -> Result<Self, GalleryError> {
        let mut entries = self.entries.clone();
        entries.push(GalleryEntry {
            identity: identity.into(),
            embedding,
        });
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension, `None` for an empty gallery.
    pub fn dim(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.dim())
    }

    /// Fail unless the entries can be compared with `model`-dimensional embeddings.
    /// An empty gallery fits any model.
    pub fn ensure_dim(&self, model: usize) -> Result<(), GalleryError> {
        match self.dim() {
            Some(gallery) if gallery != model => {
                Err(GalleryError::ModelDimensionMismatch { gallery, model })
            }
            _ => Ok(()),
        }
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identity.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_parallel_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        let raw = r#"{
            "embeddings": [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            "names": ["alice", "bob", "alice"]
        }"#;
        std::fs::write(&path, raw).unwrap();

        let gallery = Gallery::load(&path).unwrap();
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.dim(), Some(2));
        assert_eq!(
            gallery.identities().collect::<Vec<_>>(),
            ["alice", "bob", "alice"]
        );
    }

    #[test]
    fn test_load_length_mismatch() {
        let raw = br#"{"embeddings": [[1.0, 0.0]], "names": ["alice", "bob"]}"#;
        assert!(matches!(
            Gallery::from_json(raw),
            Err(GalleryError::LengthMismatch {
                embeddings: 1,
                names: 2
            })
        ));
    }

    #[test]
    fn test_load_dimension_mismatch() {
        let raw = br#"{"embeddings": [[1.0, 0.0], [1.0]], "names": ["a", "b"]}"#;
        assert!(matches!(
            Gallery::from_json(raw),
            Err(GalleryError::DimensionMismatch {
                index: 1,
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_load_garbage() {
        assert!(matches!(
            Gallery::from_json(b"not json"),
            Err(GalleryError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Gallery::load(dir.path().join("absent.json")),
            Err(GalleryError::Io(_))
        ));
    }

    #[test]
    fn test_empty_gallery_is_valid() {
        let gallery = Gallery::from_json(br#"{"embeddings": [], "names": []}"#).unwrap();
        assert!(gallery.is_empty());
        assert_eq!(gallery.dim(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gallery.json");
        let gallery = Gallery::empty()
            .with_entry("alice", Embedding::new(vec![0.5, 0.5]))
            .unwrap();
        gallery.save(&path).unwrap();

        assert_eq!(Gallery::load(&path).unwrap(), gallery);
        assert!(!dir.path().join("nested").join("gallery.json.tmp").exists());
    }

    #[test]
    fn test_with_entry_leaves_original() {
        let base = Gallery::empty()
            .with_entry("alice", Embedding::new(vec![1.0, 0.0]))
            .unwrap();
        let grown = base.with_entry("bob", Embedding::new(vec![0.0, 1.0])).unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(grown.len(), 2);
        assert_eq!(grown.entries()[1].identity, "bob");
    }

    #[test]
    fn test_with_entry_rejects_wrong_dimension() {
        let base = Gallery::empty()
            .with_entry("alice", Embedding::new(vec![1.0, 0.0]))
            .unwrap();
        assert!(base.with_entry("bob", Embedding::new(vec![1.0])).is_err());
    }

    #[test]
    fn test_ensure_dim_rejects_other_model() {
        let raw = br#"{"embeddings": [[1.0, 0.0]], "names": ["alice"]}"#;
        let gallery = Gallery::from_json(raw).unwrap();
        assert!(gallery.ensure_dim(2).is_ok());
        assert!(matches!(
            gallery.ensure_dim(512),
            Err(GalleryError::ModelDimensionMismatch {
                gallery: 2,
                model: 512
            })
        ));
    }

    #[test]
    fn test_ensure_dim_empty_gallery_fits() {
        assert!(Gallery::empty().ensure_dim(512).is_ok());
    }
}
