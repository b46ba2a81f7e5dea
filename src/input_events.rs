//! Candidate input anomaly source (tab blur, paste), injected so the
//! session can subscribe without owning platform event plumbing.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAnomaly {
    /// The interview surface lost focus (tab switch, window switch).
    FocusLost,
    /// Content was pasted into the answer editor.
    PasteDetected,
}

/// Subscription-based input anomaly capability. The session subscribes
/// on Recording entry and drops the receiver on any exit, so repeated
/// start/stop cycles leak no listeners.
pub trait InputEventSource: Send + Sync {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<InputAnomaly>;
}
