//! Per-frame face pipeline: downscale → locate → embed → match → rescale → annotate.

use crate::annotate::Annotator;
use crate::detector::DetectorError;
use crate::gallery::Gallery;
use crate::oracle::{FaceEmbedder, FaceLocator};
use crate::recognizer::RecognizerError;
use crate::types::{Embedding, MatchPolicy, MatchResult, Matcher, UNKNOWN_LABEL};
use facecast_hw::Frame;
use image::RgbImage;
use thiserror::Error;

/// Working resolution relative to the captured frame.
pub const DEFAULT_DOWNSCALE: f32 = 0.25;
/// Minimum cosine similarity for a gallery entry to count as a match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.40;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("downscale factor must be in (0, 1], got {0}")]
    InvalidScale(f32),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub downscale: f32,
    pub threshold: f32,
    pub policy: MatchPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            downscale: DEFAULT_DOWNSCALE,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            policy: MatchPolicy::First,
        }
    }
}

/// An annotated frame and the matches drawn on it.
#[derive(Debug)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub matches: Vec<MatchResult>,
}

pub struct FacePipeline {
    locator: Box<dyn FaceLocator>,
    embedder: Box<dyn FaceEmbedder>,
    matcher: Box<dyn Matcher>,
    annotator: Annotator,
    options: PipelineOptions,
}

impl FacePipeline {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        embedder: Box<dyn FaceEmbedder>,
        annotator: Annotator,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        if !(options.downscale > 0.0 && options.downscale <= 1.0) {
            return Err(PipelineError::InvalidScale(options.downscale));
        }
        Ok(Self {
            locator,
            embedder,
            matcher: options.policy.matcher(),
            annotator,
            options,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Recognize and annotate one frame. Never fails: oracle errors degrade to
    /// fewer (or no) annotations.
    pub fn process(&mut self, mut frame: Frame, gallery: &Gallery) -> ProcessedFrame {
        let matches = self.recognize(&frame, gallery);
        if !matches.is_empty() {
            self.annotator.draw(frame.image_mut(), &matches);
        }
        ProcessedFrame { frame, matches }
    }

    /// Match results in full-resolution coordinates, one per face that yielded
    /// an embedding.
    pub fn recognize(&mut self, frame: &Frame, gallery: &Gallery) -> Vec<MatchResult> {
        let small = frame.downscaled(self.options.downscale);

        let faces = match self.locator.locate(&small) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    seq = frame.sequence,
                    "face detection failed; frame left unannotated"
                );
                return Vec::new();
            }
        };

        let upscale = 1.0 / self.options.downscale;
        let mut matches = Vec::with_capacity(faces.len());

        for face in &faces {
            let embedding = match self.embedder.embed(&small, face) {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        seq = frame.sequence,
                        "skipping face without embedding"
                    );
                    continue;
                }
            };

            let label = self
                .matcher
                .find(&embedding, gallery.entries(), self.options.threshold)
                .map(|hit| gallery.entries()[hit.index].identity.clone())
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

            matches.push(MatchResult {
                region: face.region().scaled(upscale),
                label,
            });
        }

        tracing::debug!(
            seq = frame.sequence,
            faces = faces.len(),
            matched = matches.len(),
            "frame recognized"
        );
        matches
    }

    /// Embedding of the most confident face in a full-size image, `None` if no face.
    pub fn best_face_embedding(
        &mut self,
        image: &RgbImage,
    ) -> Result<Option<Embedding>, PipelineError> {
        best_face_embedding(self.locator.as_mut(), self.embedder.as_mut(), image)
    }
}

/// Locate faces in `image`, keep the most confident one and embed it.
pub fn best_face_embedding(
    locator: &mut dyn FaceLocator,
    embedder: &mut dyn FaceEmbedder,
    image: &RgbImage,
) -> Result<Option<Embedding>, PipelineError> {
    let faces = locator.locate(image)?;
    let Some(best) = faces
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    else {
        return Ok(None);
    };
    Ok(Some(embedder.embed(image, best)?))
}
