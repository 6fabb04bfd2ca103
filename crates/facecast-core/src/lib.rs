//! facecast-core — Face recognition pipeline.
//!
//! SCRFD detection, ArcFace embeddings and a whole-image ResNet classifier,
//! all via ONNX Runtime on the CPU, plus the gallery, frame annotation and
//! MJPEG stream encoding used by the daemon.

pub mod alignment;
pub mod annotate;
pub mod classifier;
pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod oracle;
pub mod pipeline;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use annotate::Annotator;
pub use classifier::{Classification, ClassifierError, FaceClassifier};
pub use detector::{DetectorError, FaceDetector};
pub use encoder::{StreamEncoder, STREAM_CONTENT_TYPE};
pub use gallery::{Gallery, GalleryError};
pub use oracle::{FaceEmbedder, FaceLocator, ImageClassifier};
pub use pipeline::{FacePipeline, PipelineError, PipelineOptions, ProcessedFrame};
pub use recognizer::{FaceRecognizer, RecognizerError, ARCFACE_EMBEDDING_DIM};
pub use types::{
    BoundingBox, CosineMatcher, Embedding, FirstMatchMatcher, GalleryEntry, MatchPolicy,
    MatchResult, Matcher, Region, UNKNOWN_LABEL,
};

/// SCRFD detector file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognizer file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";
/// Whole-image classifier file name inside the model directory.
pub const CLASSIFIER_MODEL_FILE: &str = "classifier.onnx";

/// `$XDG_DATA_HOME/facecast`, falling back to `~/.local/share/facecast`.
pub fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facecast")
}

/// Default location of the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    default_data_dir().join("models")
}
