//! Whole-image identity classifier via ONNX Runtime.
//!
//! Expects a Keras-style ResNet50 export with NHWC `[1, 224, 224, 3]` input
//! and a `[1, n_classes]` probability output. Inputs are fed the way the
//! model was fine-tuned: BGR channel order scaled to [0, 1], no mean
//! subtraction. Class indices map to identities through a separate
//! label-index artifact.

use crate::oracle::ImageClassifier;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub const CLASSIFIER_INPUT_SIZE: u32 = 224;
const PIXEL_SCALE: f32 = 1.0 / 255.0;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("label index unreadable: {0}")]
    LabelsIo(#[from] std::io::Error),
    #[error("label index corrupt: {0}")]
    CorruptLabels(String),
    #[error("classifier produced {outputs} scores for {labels} labels")]
    ClassCountMismatch { outputs: usize, labels: usize },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Top-1 prediction. `confidence` is a percentage in 0–100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub person: String,
    pub confidence: f32,
}

/// Class index → identity, from either `["alice", "bob"]` or `{"0": "alice", "1": "bob"}`.
pub fn parse_label_index(raw: &[u8]) -> Result<Vec<String>, ClassifierError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| ClassifierError::CorruptLabels(e.to_string()))?;

    let labels = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s),
                other => Err(ClassifierError::CorruptLabels(format!("non-string label {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(map) => {
            let mut indexed = map
                .into_iter()
                .map(|(k, v)| {
                    let idx: usize = k.parse().map_err(|_| {
                        ClassifierError::CorruptLabels(format!("non-integer class index {k:?}"))
                    })?;
                    let name = v
                        .as_str()
                        .ok_or_else(|| {
                            ClassifierError::CorruptLabels(format!("non-string label for {idx}"))
                        })?
                        .to_string();
                    Ok((idx, name))
                })
                .collect::<Result<Vec<_>, ClassifierError>>()?;
            indexed.sort_by_key(|(idx, _)| *idx);
            if let Some(pos) = indexed.iter().enumerate().position(|(i, (idx, _))| i != *idx) {
                return Err(ClassifierError::CorruptLabels(format!(
                    "class indices are not contiguous from 0 (gap at {pos})"
                )));
            }
            indexed.into_iter().map(|(_, name)| name).collect()
        }
        other => {
            return Err(ClassifierError::CorruptLabels(format!(
                "expected array or object, got {other}"
            )))
        }
    };

    if labels.is_empty() {
        return Err(ClassifierError::CorruptLabels("no labels".into()));
    }
    Ok(labels)
}

/// Resize to 224×224 (aspect ignored), reorder to BGR and scale to [0, 1].
pub fn preprocess(image: &RgbImage) -> Array4<f32> {
    let size = CLASSIFIER_INPUT_SIZE;
    let resized = imageops::resize(image, size, size, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        // RGB → BGR
        for c in 0..3 {
            tensor[[0, y, x, c]] = pixel[2 - c] as f32 * PIXEL_SCALE;
        }
    }
    tensor
}

/// Turn raw scores into probabilities unless they already are.
fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution =
        scores.iter().all(|&s| (0.0..=1.0).contains(&s)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores.to_vec();
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Index and value of the largest score; the first wins on ties.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// Pick the top class and express its probability as a percentage.
pub fn top_prediction(
    scores: &[f32],
    labels: &[String],
) -> Result<Classification, ClassifierError> {
    if scores.len() != labels.len() {
        return Err(ClassifierError::ClassCountMismatch {
            outputs: scores.len(),
            labels: labels.len(),
        });
    }
    let probs = to_probabilities(scores);
    let (idx, p) = argmax(&probs)
        .ok_or_else(|| ClassifierError::InferenceFailed("empty output".into()))?;
    Ok(Classification {
        person: labels[idx].clone(),
        confidence: p * 100.0,
    })
}

/// ResNet-style classifier session plus its label index.
pub struct FaceClassifier {
    session: Session,
    labels: Vec<String>,
}

impl FaceClassifier {
    pub fn load(model_path: &str, labels_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }
        let labels = parse_label_index(&std::fs::read(labels_path)?)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            labels = labels.len(),
            "loaded classifier model"
        );

        Ok(Self { session, labels })
    }
}

impl ImageClassifier for FaceClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Classification, ClassifierError> {
        let input = preprocess(image);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("class scores: {e}")))?;
        top_prediction(scores, &self.labels)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}
