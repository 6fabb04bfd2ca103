//! facecast-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access, RGB frame conversion and the
//! [`FrameSource`] seam the streaming loop reads from.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
pub use source::{FrameSource, SourceOpener, V4lOpener};
