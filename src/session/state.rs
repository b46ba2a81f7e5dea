use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proctoring::ProctoringState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    AwaitingPermission,
    Recording,
    Stopping,
    Submitted,
    Failed,
}

impl SessionPhase {
    /// Terminal for this attempt; a new attempt requires a fresh session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Submitted | SessionPhase::Failed)
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    pub simulation_id: String,
    pub attempt_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Human-readable reason when `phase` is Failed, or the message for
    /// the most recent rejected start.
    pub failure_message: Option<String>,
}

impl SessionState {
    pub fn new(simulation_id: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            simulation_id: simulation_id.into(),
            attempt_id: None,
            started_at: None,
            ended_at: None,
            failure_message: None,
        }
    }

    pub(crate) fn begin_recording(&mut self, attempt_id: String, now: DateTime<Utc>) {
        self.phase = SessionPhase::Recording;
        self.attempt_id = Some(attempt_id);
        self.started_at = Some(now);
        self.failure_message = None;
    }

    pub(crate) fn submitted(&mut self, now: DateTime<Utc>) {
        self.phase = SessionPhase::Submitted;
        self.ended_at = Some(now);
    }

    pub(crate) fn failed(&mut self, now: DateTime<Utc>, message: String) {
        self.phase = SessionPhase::Failed;
        self.ended_at = Some(now);
        self.failure_message = Some(message);
    }
}

/// Read-only view for the UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub question_index: usize,
    pub question_count: usize,
    pub proctoring: ProctoringState,
}
