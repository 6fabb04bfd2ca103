//! Frame source abstraction.
//!
//! The streaming loop only ever sees a [`FrameSource`]; how it was opened
//! (V4L2 device, test double, file replay) is decided by a [`SourceOpener`].

use crate::camera::{self, Camera, CameraError};
use crate::frame::Frame;
use std::time::Duration;

/// A sequence of frames backed by an exclusively-owned device.
pub trait FrameSource: Send {
    /// Next frame, `Ok(None)` at end of stream.
    ///
    /// An error also ends the sequence; callers must not retry.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Release the device. Idempotent.
    fn close(&mut self);
}

/// Opens a fresh [`FrameSource`] for each streaming session.
pub trait SourceOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError>;

    /// Human-readable device reference for logs and status.
    fn describe(&self) -> String;
}

/// Opens `/dev/video{index}` through V4L2.
#[derive(Debug, Clone)]
pub struct V4lOpener {
    pub device_index: u32,
    pub read_timeout: Duration,
}

impl V4lOpener {
    pub fn new(device_index: u32, read_timeout: Duration) -> Self {
        Self {
            device_index,
            read_timeout,
        }
    }
}

impl SourceOpener for V4lOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        let camera = Camera::open_index(self.device_index, self.read_timeout)?;
        Ok(Box::new(camera))
    }

    fn describe(&self) -> String {
        camera::device_path(self.device_index)
    }
}
