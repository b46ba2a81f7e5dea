//! Chunked upload pipeline: best-effort streaming uploads plus the
//! awaited final summary and finish calls.

use std::sync::Arc;

use tokio::time::Duration;

use crate::backend::{ChunkKind, FaceFlag, FinalSummary, ReviewBackend};
use crate::config::ProctorConfig;
use crate::error::BackendError;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const FINAL_RETRY_DELAY_MS: u64 = 500;

/// Upload fan-out for one attempt. Cheap to clone; every loop that
/// produces chunks or flags holds its own handle.
pub struct UploadPipeline<B> {
    backend: Arc<B>,
    attempt_id: String,
    final_retries: u32,
}

impl<B> Clone for UploadPipeline<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            attempt_id: self.attempt_id.clone(),
            final_retries: self.final_retries,
        }
    }
}

impl<B: ReviewBackend> UploadPipeline<B> {
    pub fn new(backend: Arc<B>, attempt_id: impl Into<String>, config: &ProctorConfig) -> Self {
        Self {
            backend,
            attempt_id: attempt_id.into(),
            final_retries: config.final_upload_retries,
        }
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    /// Fire-and-forget streaming chunk. Failure is logged and swallowed;
    /// a dropped chunk never interrupts recording and is not retried.
    pub fn enqueue(&self, kind: ChunkKind, payload: Vec<u8>) {
        let backend = Arc::clone(&self.backend);
        let attempt_id = self.attempt_id.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.upload_chunk(&attempt_id, kind, payload).await {
                log_warn!(
                    "dropped {} chunk for attempt {}: {}",
                    kind.as_str(),
                    attempt_id,
                    err
                );
            }
        });
    }

    /// Fire-and-forget proctoring flag.
    pub fn flag(&self, flag: FaceFlag) {
        let backend = Arc::clone(&self.backend);
        let attempt_id = self.attempt_id.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.face_flag(&attempt_id, flag).await {
                log_warn!("face flag for attempt {} not delivered: {}", attempt_id, err);
            }
        });
    }

    /// Deliver the accumulated proctoring summary. Audit-critical:
    /// failure propagates after bounded retries.
    pub async fn upload_final(&self, summary: &FinalSummary) -> Result<(), BackendError> {
        let mut attempt = 0;
        loop {
            match self.backend.upload_summary(&self.attempt_id, summary).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.final_retries => {
                    attempt += 1;
                    log_warn!(
                        "final summary upload failed (try {}/{}): {}",
                        attempt,
                        self.final_retries,
                        err
                    );
                    tokio::time::sleep(Duration::from_millis(FINAL_RETRY_DELAY_MS)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Mark the attempt complete. Called once, after the final summary
    /// upload attempt.
    pub async fn finish(&self) -> Result<(), BackendError> {
        self.backend.finish(&self.attempt_id).await?;
        log_info!("attempt {} marked finished", self.attempt_id);
        Ok(())
    }
}
