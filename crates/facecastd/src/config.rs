use facecast_core::{MatchPolicy, PipelineOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 5001);
const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (default: 127.0.0.1:5001).
    pub bind: SocketAddr,
    /// V4L2 device index; `N` opens `/dev/videoN`.
    pub camera_index: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Persisted gallery artifact.
    pub gallery_path: PathBuf,
    /// Classifier label index (class index → identity).
    pub labels_path: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    pub match_policy: MatchPolicy,
    pub jpeg_quality: u8,
    /// Upper bound on a single camera read.
    pub read_timeout: Duration,
    /// Font used for label text; drawn without text if unreadable.
    pub font_path: PathBuf,
}

impl Config {
    /// Load configuration from `FACECAST_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACECAST_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facecast_core::default_model_dir());

        let gallery_path = std::env::var("FACECAST_GALLERY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facecast_core::default_data_dir().join("gallery.json"));

        let labels_path = std::env::var("FACECAST_LABELS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join("labels.json"));

        let match_policy = match std::env::var("FACECAST_MATCH_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "ignoring FACECAST_MATCH_POLICY");
                MatchPolicy::default()
            }),
            Err(_) => MatchPolicy::default(),
        };

        Self {
            bind: env_parse("FACECAST_BIND").unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND)),
            camera_index: env_parse("FACECAST_CAMERA_INDEX").unwrap_or(0),
            model_dir,
            gallery_path,
            labels_path,
            similarity_threshold: env_parse("FACECAST_SIMILARITY_THRESHOLD")
                .unwrap_or(facecast_core::pipeline::DEFAULT_SIMILARITY_THRESHOLD),
            match_policy,
            jpeg_quality: env_parse::<u8>("FACECAST_JPEG_QUALITY")
                .unwrap_or(facecast_core::encoder::DEFAULT_JPEG_QUALITY)
                .clamp(1, 100),
            read_timeout: Duration::from_millis(
                env_parse("FACECAST_READ_TIMEOUT_MS").unwrap_or(2000),
            ),
            font_path: std::env::var("FACECAST_FONT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FONT_PATH)),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_file(facecast_core::DETECTOR_MODEL_FILE)
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_file(facecast_core::RECOGNIZER_MODEL_FILE)
    }

    /// Path to the whole-image classifier model.
    pub fn classifier_model_path(&self) -> String {
        self.model_file(facecast_core::CLASSIFIER_MODEL_FILE)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            threshold: self.similarity_threshold,
            policy: self.match_policy,
            ..PipelineOptions::default()
        }
    }

    fn model_file(&self, name: &str) -> String {
        self.model_dir.join(name).to_string_lossy().into_owned()
    }
}

impl Default for Config {
    fn default() -> Self {
        let model_dir = facecast_core::default_model_dir();
        Self {
            bind: SocketAddr::from(DEFAULT_BIND),
            camera_index: 0,
            gallery_path: facecast_core::default_data_dir().join("gallery.json"),
            labels_path: model_dir.join("labels.json"),
            model_dir,
            similarity_threshold: facecast_core::pipeline::DEFAULT_SIMILARITY_THRESHOLD,
            match_policy: MatchPolicy::First,
            jpeg_quality: facecast_core::encoder::DEFAULT_JPEG_QUALITY,
            read_timeout: Duration::from_millis(2000),
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
