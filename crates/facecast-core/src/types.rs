use serde::{Deserialize, Serialize};

/// Detector output: a face box in the coordinates of the image it was found in,
/// with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer pixel region, rounded outward to whole pixels.
    pub fn region(&self) -> Region {
        Region {
            top: self.y.floor() as i32,
            right: (self.x + self.width).ceil() as i32,
            bottom: (self.y + self.height).ceil() as i32,
            left: self.x.floor() as i32,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Pixel region in (top, right, bottom, left) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl Region {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Multiply every coordinate by `k`, e.g. `k = 4` to undo a 0.25 downscale.
    pub fn scaled(&self, k: f32) -> Region {
        let s = |v: i32| (v as f32 * k).round() as i32;
        Region {
            top: s(self.top),
            right: s(self.right),
            bottom: s(self.bottom),
            left: s(self.left),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// Returns 0.0 if either vector is zero or the dimensions differ.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// One known identity and its reference embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub identity: String,
    pub embedding: Embedding,
}

/// Label drawn for a face that matched nobody in the gallery.
pub const UNKNOWN_LABEL: &str = "unknown";

/// A labelled face in full-resolution frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub region: Region,
    pub label: String,
}

impl MatchResult {
    pub fn is_known(&self) -> bool {
        self.label != UNKNOWN_LABEL
    }
}

/// Gallery position and similarity of a matched entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalleryHit {
    pub index: usize,
    pub similarity: f32,
}

/// The match predicate shared by every matcher. Embeddings of different
/// dimension never match.
pub fn is_match(probe: &Embedding, candidate: &Embedding, threshold: f32) -> bool {
    probe.dim() == candidate.dim() && probe.similarity(candidate) >= threshold
}

/// Strategy for comparing a probe embedding against gallery entries.
pub trait Matcher: Send + Sync {
    fn find(
        &self,
        probe: &Embedding,
        gallery: &[GalleryEntry],
        threshold: f32,
    ) -> Option<GalleryHit>;
}

/// Returns the first entry, in insertion order, that satisfies [`is_match`],
/// even when a later entry is closer.
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn find(
        &self,
        probe: &Embedding,
        gallery: &[GalleryEntry],
        threshold: f32,
    ) -> Option<GalleryHit> {
        gallery
            .iter()
            .position(|entry| is_match(probe, &entry.embedding, threshold))
            .map(|index| GalleryHit {
                index,
                similarity: probe.similarity(&gallery[index].embedding),
            })
    }
}

/// Returns the most similar entry that satisfies [`is_match`]. Ties keep the
/// earlier entry.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn find(
        &self,
        probe: &Embedding,
        gallery: &[GalleryEntry],
        threshold: f32,
    ) -> Option<GalleryHit> {
        let mut best: Option<GalleryHit> = None;

        for (index, entry) in gallery.iter().enumerate() {
            if !is_match(probe, &entry.embedding, threshold) {
                continue;
            }
            let similarity = probe.similarity(&entry.embedding);
            match best {
                Some(b) if b.similarity >= similarity => {}
                _ => best = Some(GalleryHit { index, similarity }),
            }
        }

        best
    }
}

/// Which matcher the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// First satisfying entry in insertion order.
    #[default]
    First,
    /// Most similar satisfying entry.
    Best,
}

impl MatchPolicy {
    pub fn matcher(self) -> Box<dyn Matcher> {
        match self {
            MatchPolicy::First => Box::new(FirstMatchMatcher),
            MatchPolicy::Best => Box::new(CosineMatcher),
        }
    }
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchPolicy::First),
            "best" => Ok(MatchPolicy::Best),
            other => Err(format!(
                "unknown match policy {other:?} (expected \"first\" or \"best\")"
            )),
        }
    }
}
