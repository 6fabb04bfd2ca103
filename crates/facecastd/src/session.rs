//! Live stream sessions.
//!
//! A session owns the camera for the lifetime of one `/multi` connection.
//! It runs on a dedicated OS thread: read a frame, run the face pipeline,
//! encode, push the chunk into a capacity-1 channel whose receiver is the
//! HTTP body. When the client goes away the receiver is dropped, the next
//! send fails, and the loop ends and releases the camera.

use crate::state::GalleryHandle;
use bytes::Bytes;
use facecast_core::encoder::EncodeError;
use facecast_core::{FacePipeline, StreamEncoder};
use facecast_hw::{CameraError, FrameSource, SourceOpener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera is held by another stream")]
    DeviceBusy,
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(#[from] CameraError),
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Exclusive-ownership flag for the single camera.
#[derive(Debug, Default)]
pub struct CameraSlot {
    busy: AtomicBool,
}

impl CameraSlot {
    /// Claim the camera, or `None` if another session holds it.
    pub fn try_claim(self: &Arc<Self>) -> Option<SlotClaim> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotClaim { slot: self.clone() })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held by the session owning the camera; dropping it frees the slot.
#[derive(Debug)]
pub struct SlotClaim {
    slot: Arc<CameraSlot>,
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// Per-session view of the shared state.
#[derive(Clone)]
pub struct SessionContext {
    pub pipeline: Arc<Mutex<FacePipeline>>,
    pub gallery: GalleryHandle,
    pub encoder: StreamEncoder,
    pub shutdown: Arc<AtomicBool>,
}

/// Why a session loop stopped.
#[derive(Debug)]
pub enum SessionEnd {
    ClientGone,
    EndOfStream,
    SourceFailed(CameraError),
    EncodeFailed(EncodeError),
    Shutdown,
}

#[derive(Debug)]
pub struct SessionReport {
    pub frames_sent: u64,
    pub end: SessionEnd,
}

/// A started session: the chunk stream for the response body and the worker
/// thread.
pub struct StreamSession {
    pub chunks: mpsc::Receiver<Bytes>,
    pub worker: JoinHandle<SessionReport>,
}

/// Claim the camera, open the source and start the session thread.
///
/// Blocking: opening a V4L2 device touches the driver. Fails fast with
/// `DeviceBusy` when another session streams, `DeviceUnavailable` when the
/// device cannot be opened; either way nothing is left claimed.
pub fn start_session(
    opener: &dyn SourceOpener,
    slot: &Arc<CameraSlot>,
    ctx: SessionContext,
) -> Result<StreamSession, SessionError> {
    let claim = slot.try_claim().ok_or(SessionError::DeviceBusy)?;
    let source = opener.open()?;
    let device = opener.describe();
    tracing::info!(device = %device, "stream session opened");

    let (tx, chunks) = mpsc::channel::<Bytes>(1);

    let worker = std::thread::Builder::new()
        .name("facecast-session".into())
        .spawn(move || {
            let report = run_session(source, tx, &ctx);
            drop(claim);
            tracing::info!(
                device = %device,
                frames = report.frames_sent,
                end = ?report.end,
                "stream session closed"
            );
            report
        })?;

    Ok(StreamSession { chunks, worker })
}

/// The per-frame loop. Always closes `source` exactly once before returning.
pub(crate) fn run_session(
    mut source: Box<dyn FrameSource>,
    tx: mpsc::Sender<Bytes>,
    ctx: &SessionContext,
) -> SessionReport {
    let mut frames_sent = 0u64;

    let end = loop {
        // Disconnect and shutdown are only observed between frames.
        if tx.is_closed() {
            break SessionEnd::ClientGone;
        }
        if ctx.shutdown.load(Ordering::SeqCst) {
            break SessionEnd::Shutdown;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break SessionEnd::EndOfStream,
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed; ending stream");
                break SessionEnd::SourceFailed(e);
            }
        };

        let gallery = ctx.gallery.snapshot();
        let processed = ctx
            .pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .process(frame, &gallery);

        let chunk = match ctx.encoder.encode_chunk(processed.frame.image()) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!(error = %e, "frame encoding failed; ending stream");
                break SessionEnd::EncodeFailed(e);
            }
        };

        if tx.blocking_send(Bytes::from(chunk)).is_err() {
            break SessionEnd::ClientGone;
        }
        frames_sent += 1;
    };

    source.close();
    SessionReport { frames_sent, end }
}
