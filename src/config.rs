/// Configuration for a proctored session with tunable cadences and thresholds.
#[derive(Debug, Clone)]
pub struct ProctorConfig {
    /// Recorder segment cadence; small frequent chunks so a crash loses
    /// at most one interval.
    pub chunk_interval_ms: u64,

    /// Presence detection tick for the native and pixel-heuristic detectors.
    pub detect_interval_ms: u64,

    /// Presence detection tick when the ML model detector is active.
    pub model_detect_interval_ms: u64,

    /// Watchdog on a single detection tick (frame grab + detect).
    pub tick_timeout_ms: u64,

    /// Same-type violations inside this window are suppressed.
    pub violation_window_ms: u64,

    /// Lifetime of the latest-violation banner.
    pub banner_ttl_ms: u64,

    /// Surface a NO_FACE notification only every Nth non-suppressed occurrence.
    pub no_face_notify_every: u32,

    /// |yaw| beyond this reports HEAD_TURNED.
    pub yaw_threshold_deg: f32,

    /// |pitch| beyond this reports HEAD_TILTED.
    pub pitch_threshold_deg: f32,

    /// Derived question lists are padded with fallbacks up to this count.
    pub min_question_count: usize,

    /// Delay between the welcome narration and the first question.
    pub first_question_delay_ms: u64,

    /// Bounded retries for the final summary upload only; streaming
    /// chunks are never retried.
    pub final_upload_retries: u32,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 2_000,
            detect_interval_ms: 3_000,
            model_detect_interval_ms: 2_000,
            tick_timeout_ms: 10_000,
            violation_window_ms: 5_000,
            banner_ttl_ms: 5_000,
            no_face_notify_every: 3,
            yaw_threshold_deg: 30.0,
            pitch_threshold_deg: 25.0,
            min_question_count: 5,
            first_question_delay_ms: 4_000,
            final_upload_retries: 2,
        }
    }
}
