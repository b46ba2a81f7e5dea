//! Capability fakes for exercising the session controller end-to-end.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;

use proctor::backend::{ChunkKind, FaceFlag, FinalSummary, ReviewBackend};
use proctor::capture::{ConsentPrompt, MediaDevices, MediaRecorder, MediaStream, RecorderState};
use proctor::detection::{DetectedFace, FaceDetector};
use proctor::error::{BackendError, CaptureError, DetectError, SpeechError};
use proctor::input_events::{InputAnomaly, InputEventSource};
use proctor::speech::{SpeechSignal, SpeechSynthesizer};
use proctor::{Capabilities, ProctorConfig, SessionController, SessionPlan};

/// Shrunk cadences so scenarios complete in tens of milliseconds.
pub fn fast_config() -> ProctorConfig {
    ProctorConfig {
        chunk_interval_ms: 20,
        detect_interval_ms: 25,
        model_detect_interval_ms: 25,
        violation_window_ms: 200,
        banner_ttl_ms: 100,
        first_question_delay_ms: 30,
        ..ProctorConfig::default()
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub start_calls: AtomicU32,
    pub finish_calls: AtomicU32,
    pub chunks: Mutex<Vec<(ChunkKind, Vec<u8>)>>,
    pub summaries: Mutex<Vec<FinalSummary>>,
    pub flags: Mutex<Vec<FaceFlag>>,
    pub fail_start: AtomicBool,
    pub fail_summary: AtomicBool,
    pub fail_finish: AtomicBool,
}

impl FakeBackend {
    pub fn chunk_counts(&self) -> (usize, usize) {
        let chunks = self.chunks.lock().unwrap();
        let video = chunks.iter().filter(|(k, _)| *k == ChunkKind::Video).count();
        let screen = chunks.iter().filter(|(k, _)| *k == ChunkKind::Screen).count();
        (video, screen)
    }
}

impl ReviewBackend for FakeBackend {
    async fn start_attempt(&self, _simulation_id: &str) -> Result<String, BackendError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 404,
                detail: "Simulation not found".into(),
            });
        }
        Ok("attempt-1".into())
    }

    async fn upload_chunk(
        &self,
        _attempt_id: &str,
        kind: ChunkKind,
        payload: Vec<u8>,
    ) -> Result<(), BackendError> {
        self.chunks.lock().unwrap().push((kind, payload));
        Ok(())
    }

    async fn upload_summary(
        &self,
        _attempt_id: &str,
        summary: &FinalSummary,
    ) -> Result<(), BackendError> {
        if self.fail_summary.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 500,
                detail: "summary rejected".into(),
            });
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }

    async fn finish(&self, _attempt_id: &str) -> Result<(), BackendError> {
        if self.fail_finish.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".into()));
        }
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn face_flag(&self, _attempt_id: &str, flag: FaceFlag) -> Result<(), BackendError> {
        self.flags.lock().unwrap().push(flag);
        Ok(())
    }
}

pub struct FakeStream {
    pub stopped: AtomicBool,
    frame: Mutex<RgbaImage>,
}

impl FakeStream {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            frame: Mutex::new(RgbaImage::from_pixel(64, 48, Rgba([120, 120, 120, 255]))),
        }
    }
}

impl MediaStream for FakeStream {
    fn capture_frame(&self) -> Result<RgbaImage, CaptureError> {
        Ok(self.frame.lock().unwrap().clone())
    }

    fn stop_tracks(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct FakeRecorder {
    state: RecorderState,
}

impl MediaRecorder for FakeRecorder {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn pull_chunk(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        match self.state {
            RecorderState::Recording => Ok(Some(vec![0u8; 16])),
            RecorderState::Inactive => Ok(None),
        }
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    fn stop(&mut self) {
        self.state = RecorderState::Inactive;
    }
}

pub struct FakeDevices {
    pub camera_calls: AtomicU32,
    pub screen_calls: AtomicU32,
    pub deny_camera: AtomicBool,
    pub deny_screen: AtomicBool,
    pub camera_stream: Arc<FakeStream>,
    pub screen_stream: Arc<FakeStream>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            camera_calls: AtomicU32::new(0),
            screen_calls: AtomicU32::new(0),
            deny_camera: AtomicBool::new(false),
            deny_screen: AtomicBool::new(false),
            camera_stream: Arc::new(FakeStream::new()),
            screen_stream: Arc::new(FakeStream::new()),
        }
    }

    pub fn device_calls(&self) -> u32 {
        self.camera_calls.load(Ordering::SeqCst) + self.screen_calls.load(Ordering::SeqCst)
    }
}

impl MediaDevices for FakeDevices {
    fn open_camera(&self) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.camera_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_camera.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("camera denied".into()));
        }
        Ok(Arc::clone(&self.camera_stream) as Arc<dyn MediaStream>)
    }

    fn open_screen(&self) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.screen_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_screen.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("screen share declined".into()));
        }
        Ok(Arc::clone(&self.screen_stream) as Arc<dyn MediaStream>)
    }

    fn recorder(
        &self,
        _stream: Arc<dyn MediaStream>,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        Ok(Box::new(FakeRecorder {
            state: RecorderState::Inactive,
        }))
    }
}

pub struct FakeConsent {
    pub accept: AtomicBool,
    pub prompts: AtomicU32,
}

impl FakeConsent {
    pub fn new(accept: bool) -> Self {
        Self {
            accept: AtomicBool::new(accept),
            prompts: AtomicU32::new(0),
        }
    }
}

impl ConsentPrompt for FakeConsent {
    fn confirm(&self, _message: &str) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.accept.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub utterances: Mutex<Vec<String>>,
    pub cancels: AtomicU32,
}

impl FakeSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }
}

impl SpeechSynthesizer for FakeSpeech {
    fn speak(
        &self,
        text: &str,
        signals: mpsc::UnboundedSender<SpeechSignal>,
    ) -> Result<(), SpeechError> {
        self.utterances.lock().unwrap().push(text.to_string());
        let _ = signals.send(SpeechSignal::Started);
        let _ = signals.send(SpeechSignal::Ended);
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeInput {
    tx: Mutex<Option<mpsc::UnboundedSender<InputAnomaly>>>,
}

impl FakeInput {
    pub fn emit(&self, anomaly: InputAnomaly) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(anomaly);
        }
    }
}

impl InputEventSource for FakeInput {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<InputAnomaly> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().unwrap() = Some(tx);
        rx
    }
}

/// Detector that plays back a scripted sequence of face counts, then
/// settles on a default.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Vec<DetectedFace>>>,
    default_count: usize,
}

impl ScriptedDetector {
    pub fn new(default_count: usize) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_count,
        }
    }

    pub fn push_tick(&self, face_count: usize) {
        self.script.lock().unwrap().push_back(faces(face_count));
    }
}

pub fn faces(count: usize) -> Vec<DetectedFace> {
    (0..count).map(|_| DetectedFace::without_landmarks(0.9)).collect()
}

impl FaceDetector for ScriptedDetector {
    fn detect_faces(&self, _frame: &RgbaImage) -> Result<Vec<DetectedFace>, DetectError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| faces(self.default_count)))
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub devices: Arc<FakeDevices>,
    pub consent: Arc<FakeConsent>,
    pub speech: Arc<FakeSpeech>,
    pub input: Arc<FakeInput>,
    pub detector: Arc<ScriptedDetector>,
    pub controller: SessionController<FakeBackend>,
}

pub fn harness(plan: SessionPlan, config: ProctorConfig) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = Arc::new(FakeBackend::default());
    let devices = Arc::new(FakeDevices::new());
    let consent = Arc::new(FakeConsent::new(true));
    let speech = Arc::new(FakeSpeech::default());
    let input = Arc::new(FakeInput::default());
    let detector = Arc::new(ScriptedDetector::new(1));

    let caps = Capabilities {
        devices: Arc::clone(&devices),
        consent: Arc::clone(&consent),
        speech: Arc::clone(&speech),
        input: Arc::clone(&input),
        native_detector: Some(Arc::clone(&detector)),
        model_detector: None,
    };

    let controller = SessionController::new(plan, caps, Arc::clone(&backend), config);

    Harness {
        backend,
        devices,
        consent,
        speech,
        input,
        detector,
        controller,
    }
}

pub fn plan(simulation_id: &str) -> SessionPlan {
    SessionPlan {
        simulation_id: simulation_id.to_string(),
        questions: None,
        prompt_text: String::new(),
    }
}
