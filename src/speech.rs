//! Speech synthesis capability and the session narrator.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::SpeechError;
use crate::events::SessionEvent;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechSignal {
    Started,
    Ended,
    Errored(String),
}

/// Text-to-speech capability. Vocalization is asynchronous; progress is
/// reported on the signal channel passed to `speak`.
pub trait SpeechSynthesizer: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    fn speak(
        &self,
        text: &str,
        signals: mpsc::UnboundedSender<SpeechSignal>,
    ) -> Result<(), SpeechError>;

    /// Cancel any in-flight utterance. No-op when idle.
    fn cancel(&self);
}

/// Fire-and-forget narration for the session. Cancels any in-flight
/// utterance before starting a new one and mirrors start/end signals
/// into the session event stream as a speaking indicator.
pub struct Narrator {
    synth: Arc<dyn SpeechSynthesizer>,
    events_tx: broadcast::Sender<SessionEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Narrator {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, events_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            synth,
            events_tx,
            watcher: Mutex::new(None),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synth.is_supported()
    }

    pub fn narrate(&self, text: &str) {
        // Narration is best-effort; an unsupported synthesizer skips
        // silently and the session proceeds.
        if !self.synth.is_supported() {
            return;
        }

        self.synth.cancel();
        self.replace_watcher(None);

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(err) = self.synth.speak(text, tx) {
            log_warn!("narration failed: {err}");
            return;
        }

        let events_tx = self.events_tx.clone();
        let watcher = tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                match signal {
                    SpeechSignal::Started => {
                        let _ = events_tx.send(SessionEvent::Speaking { active: true });
                    }
                    SpeechSignal::Ended => {
                        let _ = events_tx.send(SessionEvent::Speaking { active: false });
                        break;
                    }
                    SpeechSignal::Errored(err) => {
                        log_warn!("utterance failed: {err}");
                        let _ = events_tx.send(SessionEvent::Speaking { active: false });
                        break;
                    }
                }
            }
        });
        self.replace_watcher(Some(watcher));
    }

    pub fn cancel(&self) {
        self.synth.cancel();
        self.replace_watcher(None);
        let _ = self.events_tx.send(SessionEvent::Speaking { active: false });
    }

    fn replace_watcher(&self, next: Option<JoinHandle<()>>) {
        if let Ok(mut guard) = self.watcher.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
            *guard = next;
        }
    }
}
