//! Device capture boundary: injected capabilities for consent, camera,
//! screen, and media recording, plus the shared live-preview surface.

pub mod manager;

use std::sync::{Arc, RwLock};

use image::RgbaImage;

use crate::error::CaptureError;

pub use manager::MediaCaptureManager;

/// Informative confirmation shown before any device-permission API is
/// touched. Declining fails the session start fast.
pub trait ConsentPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// A live handle to device or display frames plus audio.
pub trait MediaStream: Send + Sync {
    /// Grab one still frame at the stream's native resolution. Streams
    /// without a frame source (e.g. display capture on some platforms)
    /// return `FrameUnavailable`.
    fn capture_frame(&self) -> Result<RgbaImage, CaptureError>;

    /// Stop every underlying track. Must be idempotent.
    fn stop_tracks(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Stateful encoder consuming a stream and yielding binary segments.
pub trait MediaRecorder: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Drain the segment encoded since the previous pull, if any.
    fn pull_chunk(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;

    fn state(&self) -> RecorderState;

    fn stop(&mut self);
}

/// Device capture capability. `open_camera` covers camera plus
/// microphone; `open_screen` covers display capture.
pub trait MediaDevices: Send + Sync {
    fn open_camera(&self) -> Result<Arc<dyn MediaStream>, CaptureError>;

    fn open_screen(&self) -> Result<Arc<dyn MediaStream>, CaptureError>;

    fn recorder(&self, stream: Arc<dyn MediaStream>) -> Result<Box<dyn MediaRecorder>, CaptureError>;
}

/// The single live preview slot. The capture manager is the only
/// writer; the preview renderer and the detection loop are read-only
/// consumers of the same stream.
#[derive(Clone, Default)]
pub struct PreviewSurface {
    inner: Arc<RwLock<Option<Arc<dyn MediaStream>>>>,
}

impl PreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, stream: Arc<dyn MediaStream>) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(stream);
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inner.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Sample one frame from the bound stream. `None` when no stream is
    /// bound (session not recording, or already torn down).
    pub fn capture_frame(&self) -> Result<Option<RgbaImage>, CaptureError> {
        let stream = match self.inner.read() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        match stream {
            Some(stream) => stream.capture_frame().map(Some),
            None => Ok(None),
        }
    }
}
