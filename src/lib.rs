//! Proctored interview session controller.
//!
//! Coordinates the media pipelines behind a recorded interview attempt:
//! camera/screen capture with chunked best-effort upload, a periodic
//! presence detection loop, violation aggregation with suppression and
//! banner side effects, question narration, and the session lifecycle
//! state machine that ties them together. Platform specifics (devices,
//! recorders, face detection, speech, input anomalies) are injected
//! capabilities, so the controller runs the same against a browser
//! bridge, a desktop shell, or test doubles.

pub mod backend;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod input_events;
pub mod proctoring;
pub mod questions;
pub mod session;
pub mod speech;
pub mod upload;
mod utils;

pub use backend::{HttpReviewBackend, ReviewBackend};
pub use config::ProctorConfig;
pub use error::{BackendError, CaptureError, DetectError, SessionError, SpeechError};
pub use events::SessionEvent;
pub use session::{Capabilities, SessionController, SessionPhase, SessionPlan, SessionSnapshot};
