use crate::session::{CameraSlot, SessionContext};
use facecast_core::{FacePipeline, Gallery, GalleryError, ImageClassifier, StreamEncoder};
use facecast_hw::SourceOpener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Shared, swappable gallery.
///
/// Readers take a cheap `Arc` snapshot per frame; enrollment replaces the
/// whole gallery, never mutating one a reader may hold.
#[derive(Clone, Default)]
pub struct GalleryHandle {
    current: Arc<RwLock<Arc<Gallery>>>,
}

impl GalleryHandle {
    pub fn new(gallery: Gallery) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(gallery))),
        }
    }

    pub fn snapshot(&self) -> Arc<Gallery> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Derive a new gallery from the current one and swap it in.
    ///
    /// The write lock is held across `derive`, so concurrent updates are
    /// serialized and none is lost. On error the current gallery is kept.
    pub fn update<E>(
        &self,
        derive: impl FnOnce(&Gallery) -> Result<Gallery, E>,
    ) -> Result<Arc<Gallery>, E> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(derive(&current)?);
        *current = next.clone();
        Ok(next)
    }
}

/// Load the startup gallery and check it was built with a recognizer producing
/// `embedding_dim`-dimensional embeddings.
pub fn load_gallery(path: &Path, embedding_dim: usize) -> Result<Gallery, GalleryError> {
    let gallery = Gallery::load(path)?;
    gallery.ensure_dim(embedding_dim)?;
    Ok(gallery)
}

/// Everything the HTTP handlers share.
///
/// Built once in `main` and handed to the router.
pub struct AppState {
    pub gallery: GalleryHandle,
    /// Where enrollment persists the gallery; `None` keeps updates in memory.
    pub gallery_path: Option<PathBuf>,
    pub pipeline: Arc<Mutex<FacePipeline>>,
    pub classifier: Arc<Mutex<Box<dyn ImageClassifier>>>,
    /// Label count, read once so status never waits on a running classification.
    pub classifier_labels: usize,
    pub opener: Arc<dyn SourceOpener>,
    pub slot: Arc<CameraSlot>,
    pub encoder: StreamEncoder,
    shutdown: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        gallery: Gallery,
        gallery_path: Option<PathBuf>,
        pipeline: FacePipeline,
        classifier: Box<dyn ImageClassifier>,
        opener: Arc<dyn SourceOpener>,
        encoder: StreamEncoder,
    ) -> Self {
        Self {
            gallery: GalleryHandle::new(gallery),
            gallery_path,
            pipeline: Arc::new(Mutex::new(pipeline)),
            classifier_labels: classifier.labels().len(),
            classifier: Arc::new(Mutex::new(classifier)),
            opener,
            slot: Arc::new(CameraSlot::default()),
            encoder,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            pipeline: self.pipeline.clone(),
            gallery: self.gallery.clone(),
            encoder: self.encoder,
            shutdown: self.shutdown.clone(),
        }
    }

    /// Ask running stream sessions to stop after their current frame.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
