//! facecastd — HTTP face-recognition daemon.
//!
//! Serves single-image classification, an annotated live MJPEG feed from
//! the camera and gallery enrollment.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, GalleryHandle};
