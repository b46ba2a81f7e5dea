//! Session-scoped proctoring accumulator and the violation aggregator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::backend::{FinalSummary, ProctoringSummary};
use crate::config::ProctorConfig;
use crate::events::SessionEvent;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Accumulated proctoring observations for one attempt. Counters only
/// grow; `face_count` tracks the latest tick; the multiple-faces flag is
/// sticky for the whole session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringState {
    pub tab_blur_count: u32,
    pub paste_count: u32,
    pub face_count: u32,
    pub multiple_faces_ever_observed: bool,
}

impl ProctoringState {
    pub(crate) fn observe_face_count(&mut self, count: u32) {
        self.face_count = count;
        if count > 1 {
            self.multiple_faces_ever_observed = true;
        }
    }

    pub(crate) fn record_tab_blur(&mut self) {
        self.tab_blur_count += 1;
    }

    pub(crate) fn record_paste(&mut self) {
        self.paste_count += 1;
    }

    pub fn summary(&self) -> FinalSummary {
        FinalSummary {
            paste_count: self.paste_count,
            proctoring: ProctoringSummary {
                tab_blur_count: self.tab_blur_count,
                multiple_faces: self.multiple_faces_ever_observed,
                face_count: self.face_count,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    TabBlur,
    Paste,
    NoFace,
    MultipleFaces,
    HeadTurned,
    HeadTilted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationEvent {
    pub event_type: ViolationType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub question_index: usize,
}

/// Deduplicates detector and input anomalies into an append-only,
/// time-ordered log and drives the latest-violation banner.
///
/// Same-type events inside the suppression window are dropped entirely:
/// not appended, not notified, and they do not advance the NO_FACE
/// notification counter.
pub struct ViolationAggregator {
    events_tx: broadcast::Sender<SessionEvent>,
    window: Duration,
    banner_ttl: Duration,
    no_face_notify_every: u32,
    log: Vec<ViolationEvent>,
    last_seen: HashMap<ViolationType, Instant>,
    no_face_occurrences: u32,
    banner_task: Option<JoinHandle<()>>,
}

impl ViolationAggregator {
    pub fn new(config: &ProctorConfig, events_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            events_tx,
            window: Duration::from_millis(config.violation_window_ms),
            banner_ttl: Duration::from_millis(config.banner_ttl_ms),
            no_face_notify_every: config.no_face_notify_every.max(1),
            log: Vec::new(),
            last_seen: HashMap::new(),
            no_face_occurrences: 0,
            banner_task: None,
        }
    }

    /// Append an event unless a same-type event landed within the
    /// suppression window. Returns whether the event was appended.
    pub fn record(
        &mut self,
        event_type: ViolationType,
        description: impl Into<String>,
        question_index: usize,
    ) -> bool {
        let now = Instant::now();
        if let Some(prev) = self.last_seen.get(&event_type) {
            if now.duration_since(*prev) < self.window {
                return false;
            }
        }
        self.last_seen.insert(event_type, now);

        let description = description.into();
        self.log.push(ViolationEvent {
            event_type,
            description: description.clone(),
            timestamp: Utc::now(),
            question_index,
        });
        log_info!("violation recorded: {event_type:?} (question {question_index})");

        // NO_FACE fires every tick on a flaky detector; only every Nth
        // non-suppressed occurrence reaches the candidate.
        let should_notify = match event_type {
            ViolationType::NoFace => {
                self.no_face_occurrences += 1;
                (self.no_face_occurrences - 1) % self.no_face_notify_every == 0
            }
            _ => true,
        };

        if should_notify {
            self.notify(description);
        }
        true
    }

    pub fn log(&self) -> &[ViolationEvent] {
        &self.log
    }

    fn notify(&mut self, message: String) {
        let _ = self
            .events_tx
            .send(SessionEvent::ViolationBanner { message });

        // Restart the banner timer; only the newest violation owns it.
        if let Some(task) = self.banner_task.take() {
            task.abort();
        }
        let events_tx = self.events_tx.clone();
        let ttl = self.banner_ttl;
        self.banner_task = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = events_tx.send(SessionEvent::BannerCleared);
        }));
    }

    /// Cancel the pending banner-clear timer on session teardown.
    pub(crate) fn shutdown(&mut self) {
        if let Some(task) = self.banner_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> (ViolationAggregator, broadcast::Receiver<SessionEvent>) {
        let (tx, rx) = broadcast::channel(256);
        (ViolationAggregator::new(&ProctorConfig::default(), tx), rx)
    }

    fn banner_count(rx: &mut broadcast::Receiver<SessionEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::ViolationBanner { .. }) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn same_type_within_window_is_dropped() {
        let (mut agg, _rx) = aggregator();

        assert!(agg.record(ViolationType::TabBlur, "blur", 0));
        assert!(!agg.record(ViolationType::TabBlur, "blur", 0));
        assert_eq!(agg.log().len(), 1);

        tokio::time::advance(Duration::from_millis(5_100)).await;
        assert!(agg.record(ViolationType::TabBlur, "blur", 1));
        assert_eq!(agg.log().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn different_types_do_not_suppress_each_other() {
        let (mut agg, _rx) = aggregator();

        assert!(agg.record(ViolationType::TabBlur, "blur", 0));
        assert!(agg.record(ViolationType::Paste, "paste", 0));
        assert!(agg.record(ViolationType::NoFace, "absent", 0));
        assert_eq!(agg.log().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_face_notifies_every_third_occurrence() {
        let (mut agg, mut rx) = aggregator();

        for _ in 0..10 {
            assert!(agg.record(ViolationType::NoFace, "absent", 0));
            tokio::time::advance(Duration::from_millis(5_100)).await;
        }

        assert_eq!(agg.log().len(), 10);
        // Occurrences 1, 4, 7, 10 surface.
        assert_eq!(banner_count(&mut rx), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_no_face_does_not_advance_notify_counter() {
        let (mut agg, mut rx) = aggregator();

        assert!(agg.record(ViolationType::NoFace, "absent", 0)); // occurrence 1: notify
        assert!(!agg.record(ViolationType::NoFace, "absent", 0)); // suppressed
        assert!(!agg.record(ViolationType::NoFace, "absent", 0)); // suppressed

        tokio::time::advance(Duration::from_millis(5_100)).await;
        assert!(agg.record(ViolationType::NoFace, "absent", 0)); // occurrence 2: silent

        assert_eq!(agg.log().len(), 2);
        assert_eq!(banner_count(&mut rx), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn banner_clears_after_ttl() {
        let (mut agg, mut rx) = aggregator();
        agg.record(ViolationType::Paste, "paste", 2);

        // Auto-advancing sleep lets the banner-clear timer fire first.
        tokio::time::sleep(Duration::from_millis(5_200)).await;

        let mut saw_banner = false;
        let mut saw_clear = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::ViolationBanner { .. } => saw_banner = true,
                SessionEvent::BannerCleared => saw_clear = true,
                _ => {}
            }
        }
        assert!(saw_banner);
        assert!(saw_clear);
    }

    #[tokio::test(start_paused = true)]
    async fn sticky_multiple_faces_survives_face_count_reset() {
        let mut state = ProctoringState::default();
        state.observe_face_count(3);
        assert!(state.multiple_faces_ever_observed);
        assert_eq!(state.face_count, 3);

        state.observe_face_count(1);
        assert!(state.multiple_faces_ever_observed);
        assert_eq!(state.face_count, 1);
    }
}
