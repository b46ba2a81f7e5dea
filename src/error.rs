use thiserror::Error;

/// Errors surfaced by the review backend boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request never produced an HTTP response (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx response; `detail` is already extracted into readable text.
    #[error("Backend error {status}: {detail}")]
    Api { status: u16, detail: String },

    /// 2xx response whose body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Message safe to show to the candidate. Structured API detail is
    /// passed through; transport failures collapse to a generic line so
    /// raw error chains never reach the UI.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Api { detail, .. } if !detail.is_empty() => detail.clone(),
            _ => "Could not reach the interview server. Please check your connection.".to_string(),
        }
    }
}

/// Errors from the device capture boundary.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The informative pre-prompt was declined; no device API was touched.
    #[error("Recording consent declined")]
    ConsentDeclined,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Recorder failed: {0}")]
    RecorderFailed(String),

    #[error("Frame capture failed: {0}")]
    FrameUnavailable(String),
}

/// Errors from a presence/identity detector.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Detector unsupported on this platform")]
    Unsupported,

    #[error("Detection failed: {0}")]
    Failed(String),
}

/// Errors from the speech synthesis capability.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech synthesis unsupported")]
    Unsupported,

    #[error("Speech synthesis failed: {0}")]
    Failed(String),
}

/// Errors from the session lifecycle state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No simulation selected for this interview")]
    MissingSimulation,

    #[error("Recording consent was declined")]
    ConsentDeclined,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Could not create interview attempt: {0}")]
    AttemptCreation(#[source] BackendError),

    #[error("Session is not recording")]
    NotRecording,

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Submission failed: {0}")]
    Submission(#[source] BackendError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::MissingSimulation => {
                "No simulation selected. Open the interview from a job posting and try again.".into()
            }
            SessionError::ConsentDeclined => {
                "Recording consent is required to take a proctored interview.".into()
            }
            SessionError::Capture(CaptureError::PermissionDenied(_)) => {
                "Camera and microphone access is required. Allow access and try again.".into()
            }
            SessionError::Capture(err) => format!("Could not start recording: {err}"),
            SessionError::AttemptCreation(err) | SessionError::Submission(err) => err.user_message(),
            SessionError::NotRecording => "The interview is not currently recording.".into(),
            SessionError::AlreadyStarted => "This interview attempt has already started.".into(),
        }
    }
}
