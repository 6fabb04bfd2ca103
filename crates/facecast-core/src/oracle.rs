//! Vision oracle seams.
//!
//! The pipeline only talks to these traits; the ONNX-backed detector,
//! recognizer and classifier implement them, tests plug in doubles.

use crate::classifier::{Classification, ClassifierError};
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;

/// Finds face regions in an image.
pub trait FaceLocator: Send {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Computes an identity embedding for one located face.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, RecognizerError>;
}

/// Classifies a whole image into one of a fixed set of identities.
pub trait ImageClassifier: Send {
    fn classify(&mut self, image: &RgbImage) -> Result<Classification, ClassifierError>;

    /// Known class labels, in class-index order.
    fn labels(&self) -> &[String];
}

impl FaceLocator for FaceDetector {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        self.detect(image)
    }
}

impl FaceEmbedder for FaceRecognizer {
    fn embed(
        &mut self,
        image: &RgbImage,
        face: &BoundingBox,
    ) -> Result<Embedding, RecognizerError> {
        self.extract(image, face)
    }
}
