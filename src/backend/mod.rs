//! Review backend boundary: the external service that receives recorded
//! media, proctoring flags, and the attempt lifecycle calls.

pub mod http;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub use http::HttpReviewBackend;

/// Wire tag for an uploaded chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Video,
    Screen,
    EditorEvents,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Video => "video",
            ChunkKind::Screen => "screen",
            ChunkKind::EditorEvents => "editor_events",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    NoFace,
    MultipleFaces,
}

/// Lightweight proctoring ping fired when a tick sees zero or multiple faces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceFlag {
    pub flag_type: FlagType,
    pub face_count: u32,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringSummary {
    pub tab_blur_count: u32,
    pub multiple_faces: bool,
    pub face_count: u32,
}

/// Accumulated session state delivered once, at stop, as the final
/// `editor_events` JSON chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSummary {
    pub paste_count: u32,
    pub proctoring: ProctoringSummary,
}

/// The external review/grading service, substitutable by a test double.
///
/// Methods return `impl Future + Send` so callers can drive uploads from
/// spawned tasks regardless of the concrete backend.
pub trait ReviewBackend: Send + Sync + 'static {
    fn start_attempt(
        &self,
        simulation_id: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    fn upload_chunk(
        &self,
        attempt_id: &str,
        kind: ChunkKind,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn upload_summary(
        &self,
        attempt_id: &str,
        summary: &FinalSummary,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn finish(&self, attempt_id: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn face_flag(
        &self,
        attempt_id: &str,
        flag: FaceFlag,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
