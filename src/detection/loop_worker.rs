use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::{FaceFlag, FlagType, ReviewBackend};
use crate::capture::PreviewSurface;
use crate::config::ProctorConfig;
use crate::proctoring::{ProctoringState, ViolationAggregator, ViolationType};
use crate::upload::UploadPipeline;

use super::pose::estimate_head_pose;
use super::PresenceDetector;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Everything one detection tick touches. Built by the session
/// controller at Recording entry.
pub(crate) struct DetectionContext<B> {
    pub preview: PreviewSurface,
    pub detector: PresenceDetector,
    pub pipeline: UploadPipeline<B>,
    pub proctoring: Arc<Mutex<ProctoringState>>,
    pub violations: Arc<Mutex<ViolationAggregator>>,
    pub question_cursor: Arc<AtomicUsize>,
    pub config: ProctorConfig,
}

/// Owns the detection loop task and its cancellation token.
pub struct DetectionController {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl DetectionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel: None,
        }
    }

    pub(crate) fn start<B: ReviewBackend>(&mut self, ctx: DetectionContext<B>) -> Result<()> {
        if self.handle.is_some() {
            bail!("detection loop already active");
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        self.handle = Some(tokio::spawn(detection_loop(ctx, token)));
        self.cancel = Some(cancel);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) async fn detection_loop<B: ReviewBackend>(
    ctx: DetectionContext<B>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(ctx.detector.tick_interval(&ctx.config));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let tick_timeout = Duration::from_millis(ctx.config.tick_timeout_ms);

    log_info!("detection loop started ({} detector)", ctx.detector.kind());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match time::timeout(tick_timeout, perform_tick(&ctx)).await {
                    Ok(Ok(())) => {}
                    // A failed tick degrades monitoring for one interval;
                    // the loop always continues.
                    Ok(Err(err)) => log_error!("detection tick failed: {err:?}"),
                    Err(_) => log_warn!("detection tick timeout (> {:?})", tick_timeout),
                }
            }
            _ = cancel.cancelled() => {
                log_info!("detection loop shutting down");
                break;
            }
        }
    }
}

async fn perform_tick<B: ReviewBackend>(ctx: &DetectionContext<B>) -> Result<()> {
    if !ctx.detector.is_available() {
        return Ok(());
    }

    // Stream already unbound means the session is tearing down.
    let Some(frame) = ctx
        .preview
        .capture_frame()
        .context("frame sample failed")?
    else {
        return Ok(());
    };

    let detector = ctx.detector.clone();
    let faces = tokio::task::spawn_blocking(move || detector.detect(&frame))
        .await
        .context("detector worker join failed")?
        .context("detector failed")?;

    let question_index = ctx.question_cursor.load(Ordering::Relaxed);
    let count = faces.len() as u32;

    ctx.proctoring.lock().await.observe_face_count(count);

    match count {
        0 => {
            ctx.violations.lock().await.record(
                ViolationType::NoFace,
                "No face visible in the camera frame",
                question_index,
            );
            ctx.pipeline.flag(FaceFlag {
                flag_type: FlagType::NoFace,
                face_count: 0,
                timestamp_ms: Utc::now().timestamp_millis(),
            });
        }
        1 => {
            if let Some(landmarks) = faces[0].landmarks {
                if let Some(pose) = estimate_head_pose(&landmarks) {
                    let mut violations = ctx.violations.lock().await;
                    if pose.yaw_deg.abs() > ctx.config.yaw_threshold_deg {
                        violations.record(
                            ViolationType::HeadTurned,
                            format!("Head turned away from the screen (yaw {:.0}°)", pose.yaw_deg),
                            question_index,
                        );
                    }
                    if pose.pitch_deg.abs() > ctx.config.pitch_threshold_deg {
                        violations.record(
                            ViolationType::HeadTilted,
                            format!("Head tilted away from the screen (pitch {:.0}°)", pose.pitch_deg),
                            question_index,
                        );
                    }
                }
            }
        }
        _ => {
            ctx.violations.lock().await.record(
                ViolationType::MultipleFaces,
                format!("{count} faces detected in the camera frame"),
                question_index,
            );
            ctx.pipeline.flag(FaceFlag {
                flag_type: FlagType::MultipleFaces,
                face_count: count,
                timestamp_ms: Utc::now().timestamp_millis(),
            });
        }
    }

    Ok(())
}
