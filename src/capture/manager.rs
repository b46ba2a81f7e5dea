//! Media capture manager: owns the session's streams and recorders
//! end-to-end, from the consent pre-prompt to idempotent teardown.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::{ChunkKind, ReviewBackend};
use crate::events::{DegradedCapability, SessionEvent};
use crate::upload::UploadPipeline;

use super::{ConsentPrompt, MediaDevices, MediaRecorder, MediaStream, PreviewSurface, RecorderState};
use crate::error::CaptureError;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const CONSENT_MESSAGE: &str = "This interview records your camera, microphone, and screen for \
     proctoring. Your browser will ask for permission next. Continue?";

struct StreamSet {
    camera: Arc<dyn MediaStream>,
    screen: Option<Arc<dyn MediaStream>>,
}

struct PumpSet {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct MediaCaptureManager {
    devices: Arc<dyn MediaDevices>,
    consent: Arc<dyn ConsentPrompt>,
    preview: PreviewSurface,
    chunk_interval: Duration,
    streams: Option<StreamSet>,
    pumps: Option<PumpSet>,
}

impl MediaCaptureManager {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        consent: Arc<dyn ConsentPrompt>,
        preview: PreviewSurface,
        chunk_interval_ms: u64,
    ) -> Self {
        Self {
            devices,
            consent,
            preview,
            chunk_interval: Duration::from_millis(chunk_interval_ms),
            streams: None,
            pumps: None,
        }
    }

    /// Consent gate plus device acquisition. Camera+microphone is
    /// mandatory; screen capture is optional and its denial only emits
    /// a degraded notice. On any fatal error no partial stream is left
    /// acquired.
    pub fn acquire(&mut self, events: &broadcast::Sender<SessionEvent>) -> Result<(), CaptureError> {
        if self.streams.is_some() {
            return Ok(());
        }

        if !self.consent.confirm(CONSENT_MESSAGE) {
            return Err(CaptureError::ConsentDeclined);
        }

        let camera = self.devices.open_camera()?;

        let screen = match self.devices.open_screen() {
            Ok(stream) => Some(stream),
            Err(err) => {
                log_warn!("screen capture unavailable, continuing camera-only: {err}");
                let _ = events.send(SessionEvent::Degraded {
                    capability: DegradedCapability::ScreenShare,
                    message: "Screen sharing was declined; recording camera only.".into(),
                });
                None
            }
        };

        self.preview.bind(Arc::clone(&camera));
        self.streams = Some(StreamSet { camera, screen });
        Ok(())
    }

    pub fn has_screen(&self) -> bool {
        self.streams
            .as_ref()
            .map(|s| s.screen.is_some())
            .unwrap_or(false)
    }

    /// Start one recorder per acquired stream and a pump task per
    /// recorder, each emitting a chunk every `chunk_interval`. The
    /// camera recorder is mandatory; a screen recorder failure degrades
    /// to camera-only.
    pub fn begin_recording<B: ReviewBackend>(
        &mut self,
        pipeline: &UploadPipeline<B>,
    ) -> Result<(), CaptureError> {
        if self.pumps.is_some() {
            return Ok(());
        }
        let streams = self
            .streams
            .as_ref()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no streams acquired".into()))?;

        let mut camera_recorder = self.devices.recorder(Arc::clone(&streams.camera))?;
        camera_recorder.start()?;

        let screen_recorder = match &streams.screen {
            Some(screen) => match self.devices.recorder(Arc::clone(screen)) {
                Ok(mut recorder) => match recorder.start() {
                    Ok(()) => Some(recorder),
                    Err(err) => {
                        log_warn!("screen recorder failed to start: {err}");
                        None
                    }
                },
                Err(err) => {
                    log_warn!("screen recorder unavailable: {err}");
                    None
                }
            },
            None => None,
        };

        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        handles.push(tokio::spawn(chunk_pump(
            camera_recorder,
            ChunkKind::Video,
            pipeline.clone(),
            self.chunk_interval,
            cancel.child_token(),
        )));
        if let Some(recorder) = screen_recorder {
            handles.push(tokio::spawn(chunk_pump(
                recorder,
                ChunkKind::Screen,
                pipeline.clone(),
                self.chunk_interval,
                cancel.child_token(),
            )));
        }

        self.pumps = Some(PumpSet { cancel, handles });
        Ok(())
    }

    /// Full teardown: pumps joined (so no further chunks are produced
    /// once this returns), recorders stopped, every track stopped, the
    /// preview unbound. Safe to call repeatedly and from any state.
    pub async fn stop(&mut self) {
        if let Some(pumps) = self.pumps.take() {
            pumps.cancel.cancel();
            for handle in pumps.handles {
                if let Err(err) = handle.await {
                    log_warn!("chunk pump task failed to join: {err}");
                }
            }
        }

        if let Some(streams) = self.streams.take() {
            streams.camera.stop_tracks();
            if let Some(screen) = streams.screen {
                screen.stop_tracks();
            }
            log_info!("capture streams released");
        }

        self.preview.clear();
    }

    pub fn is_active(&self) -> bool {
        self.pumps.is_some()
    }
}

/// Drain one recorder on a fixed cadence, forwarding each segment to
/// the upload pipeline. On cancellation the recorder is drained one
/// last time and stopped (only if still recording).
async fn chunk_pump<B: ReviewBackend>(
    mut recorder: Box<dyn MediaRecorder>,
    kind: ChunkKind,
    pipeline: UploadPipeline<B>,
    chunk_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(chunk_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; skip it so the
    // first chunk covers a full interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match recorder.pull_chunk() {
                    Ok(Some(payload)) => pipeline.enqueue(kind, payload),
                    Ok(None) => {}
                    Err(err) => log_warn!("{} recorder pull failed: {err}", kind.as_str()),
                }
            }
            _ = cancel.cancelled() => {
                if recorder.state() == RecorderState::Recording {
                    if let Ok(Some(payload)) = recorder.pull_chunk() {
                        pipeline.enqueue(kind, payload);
                    }
                    recorder.stop();
                }
                break;
            }
        }
    }
}
