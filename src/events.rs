//! Session event stream consumed by the UI layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::SessionPhase;

/// Capability that entered degraded mode without aborting the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DegradedCapability {
    ScreenShare,
    PresenceDetection,
    Narration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    PhaseChanged {
        phase: SessionPhase,
        timestamp: DateTime<Utc>,
    },

    QuestionChanged {
        index: usize,
        text: String,
    },

    /// Latest-violation banner text; cleared by `BannerCleared` after
    /// the configured TTL.
    ViolationBanner {
        message: String,
    },

    BannerCleared,

    /// Narration activity indicator.
    Speaking {
        active: bool,
    },

    /// A capability failed or was denied but the session continues.
    Degraded {
        capability: DegradedCapability,
        message: String,
    },
}
