//! Session lifecycle controller: composes capture, detection,
//! aggregation, narration, and upload for one interview attempt.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::ReviewBackend;
use crate::capture::{ConsentPrompt, MediaCaptureManager, MediaDevices, PreviewSurface};
use crate::config::ProctorConfig;
use crate::detection::loop_worker::DetectionContext;
use crate::detection::{DetectionController, FaceDetector, PresenceDetector};
use crate::error::{BackendError, CaptureError, SessionError};
use crate::events::{DegradedCapability, SessionEvent};
use crate::input_events::{InputAnomaly, InputEventSource};
use crate::proctoring::{ProctoringState, ViolationAggregator, ViolationEvent, ViolationType};
use crate::questions::{derive_questions, AdvanceOutcome, QuestionSequencer, QuestionSpec};
use crate::speech::{Narrator, SpeechSynthesizer};
use crate::upload::UploadPipeline;

use super::state::{SessionPhase, SessionSnapshot, SessionState};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

const WELCOME_MESSAGE: &str = "Welcome to your interview. Recording has started; \
     the first question will be read in a moment.";

const CLOSING_MESSAGE: &str = "That was the final question. Please finish your answer \
     and submit when you are ready.";

/// Inputs for one interview attempt.
pub struct SessionPlan {
    pub simulation_id: String,
    /// Structured questions from the interview service, when available.
    pub questions: Option<Vec<QuestionSpec>>,
    /// Free-text simulation prompt used to derive questions otherwise.
    pub prompt_text: String,
}

/// Injected platform capabilities. Every one is substitutable by a
/// test double.
pub struct Capabilities {
    pub devices: Arc<dyn MediaDevices>,
    pub consent: Arc<dyn ConsentPrompt>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub input: Arc<dyn InputEventSource>,
    pub native_detector: Option<Arc<dyn FaceDetector>>,
    pub model_detector: Option<Arc<dyn FaceDetector>>,
}

struct AuxTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct SessionController<B> {
    config: ProctorConfig,
    backend: Arc<B>,
    state: Arc<Mutex<SessionState>>,
    capture: Arc<Mutex<MediaCaptureManager>>,
    detection: Arc<Mutex<DetectionController>>,
    proctoring: Arc<Mutex<ProctoringState>>,
    violations: Arc<Mutex<ViolationAggregator>>,
    sequencer: Arc<Mutex<QuestionSequencer>>,
    narrator: Arc<Narrator>,
    preview: PreviewSurface,
    input_source: Arc<dyn InputEventSource>,
    native_detector: Option<Arc<dyn FaceDetector>>,
    model_detector: Option<Arc<dyn FaceDetector>>,
    pipeline: Arc<Mutex<Option<UploadPipeline<B>>>>,
    aux: Arc<Mutex<Option<AuxTasks>>>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl<B> Clone for SessionController<B> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
            capture: Arc::clone(&self.capture),
            detection: Arc::clone(&self.detection),
            proctoring: Arc::clone(&self.proctoring),
            violations: Arc::clone(&self.violations),
            sequencer: Arc::clone(&self.sequencer),
            narrator: Arc::clone(&self.narrator),
            preview: self.preview.clone(),
            input_source: Arc::clone(&self.input_source),
            native_detector: self.native_detector.clone(),
            model_detector: self.model_detector.clone(),
            pipeline: Arc::clone(&self.pipeline),
            aux: Arc::clone(&self.aux),
            events_tx: self.events_tx.clone(),
        }
    }
}

impl<B: ReviewBackend> SessionController<B> {
    pub fn new(plan: SessionPlan, caps: Capabilities, backend: Arc<B>, config: ProctorConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let preview = PreviewSurface::new();

        let questions = derive_questions(plan.questions, &plan.prompt_text, config.min_question_count);
        let sequencer = QuestionSequencer::new(questions);

        let capture = MediaCaptureManager::new(
            caps.devices,
            caps.consent,
            preview.clone(),
            config.chunk_interval_ms,
        );
        let violations = ViolationAggregator::new(&config, events_tx.clone());
        let narrator = Narrator::new(caps.speech, events_tx.clone());

        Self {
            state: Arc::new(Mutex::new(SessionState::new(plan.simulation_id))),
            backend,
            capture: Arc::new(Mutex::new(capture)),
            detection: Arc::new(Mutex::new(DetectionController::new())),
            proctoring: Arc::new(Mutex::new(ProctoringState::default())),
            violations: Arc::new(Mutex::new(violations)),
            sequencer: Arc::new(Mutex::new(sequencer)),
            narrator: Arc::new(narrator),
            preview,
            input_source: caps.input,
            native_detector: caps.native_detector,
            model_detector: caps.model_detector,
            pipeline: Arc::new(Mutex::new(None)),
            aux: Arc::new(Mutex::new(None)),
            events_tx,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// The live camera preview; the UI renders it, the detection loop
    /// samples frames from it.
    pub fn preview(&self) -> PreviewSurface {
        self.preview.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await.clone();
        let (question_index, question_count) = {
            let sequencer = self.sequencer.lock().await;
            (sequencer.cursor(), sequencer.len())
        };
        SessionSnapshot {
            state,
            question_index,
            question_count,
            proctoring: self.proctoring.lock().await.clone(),
        }
    }

    pub async fn violation_log(&self) -> Vec<ViolationEvent> {
        self.violations.lock().await.log().to_vec()
    }

    pub async fn proctoring_state(&self) -> ProctoringState {
        self.proctoring.lock().await.clone()
    }

    /// Idle → AwaitingPermission → Recording. Any failure rolls back to
    /// Idle with no stream, recorder, or task left behind.
    pub async fn start(&self) -> Result<SessionSnapshot, SessionError> {
        {
            let mut state = self.state.lock().await;
            if state.phase != SessionPhase::Idle {
                return Err(SessionError::AlreadyStarted);
            }
            if state.simulation_id.trim().is_empty() {
                let err = SessionError::MissingSimulation;
                state.failure_message = Some(err.user_message());
                return Err(err);
            }
            state.phase = SessionPhase::AwaitingPermission;
        }
        self.emit_phase().await;

        // Consent gate + device acquisition.
        if let Err(err) = self.capture.lock().await.acquire(&self.events_tx) {
            let session_err = match err {
                CaptureError::ConsentDeclined => SessionError::ConsentDeclined,
                other => SessionError::Capture(other),
            };
            self.fail_start(session_err.user_message()).await;
            return Err(session_err);
        }

        // Attempt creation; the acquired streams are released if it fails.
        let simulation_id = self.state.lock().await.simulation_id.clone();
        let attempt_id = match self.backend.start_attempt(&simulation_id).await {
            Ok(id) => id,
            Err(err) => {
                self.capture.lock().await.stop().await;
                self.fail_start(err.user_message()).await;
                return Err(SessionError::AttemptCreation(err));
            }
        };
        log_info!("attempt {attempt_id} created for simulation {simulation_id}");

        let pipeline = UploadPipeline::new(Arc::clone(&self.backend), attempt_id.clone(), &self.config);

        if let Err(err) = self.capture.lock().await.begin_recording(&pipeline) {
            self.capture.lock().await.stop().await;
            let session_err = SessionError::Capture(err);
            self.fail_start(session_err.user_message()).await;
            return Err(session_err);
        }
        *self.pipeline.lock().await = Some(pipeline.clone());

        // Detector selection happens once; the loop is agnostic to the
        // active backend.
        let detector = PresenceDetector::select(
            self.native_detector.clone(),
            self.model_detector.clone(),
            true,
        );
        if !detector.is_available() {
            let _ = self.events_tx.send(SessionEvent::Degraded {
                capability: DegradedCapability::PresenceDetection,
                message: "Presence monitoring is unavailable on this device.".into(),
            });
        }

        let question_cursor = self.sequencer.lock().await.cursor_handle();
        let ctx = DetectionContext {
            preview: self.preview.clone(),
            detector,
            pipeline,
            proctoring: Arc::clone(&self.proctoring),
            violations: Arc::clone(&self.violations),
            question_cursor: Arc::clone(&question_cursor),
            config: self.config.clone(),
        };
        if let Err(err) = self.detection.lock().await.start(ctx) {
            log_error!("detection loop start failed: {err:?}");
        }

        self.spawn_aux_tasks(question_cursor).await;

        {
            let mut state = self.state.lock().await;
            state.begin_recording(attempt_id, Utc::now());
        }
        self.emit_phase().await;

        if !self.narrator.is_supported() {
            let _ = self.events_tx.send(SessionEvent::Degraded {
                capability: DegradedCapability::Narration,
                message: "Question narration is unavailable; read the questions on screen.".into(),
            });
        }
        self.narrator.narrate(WELCOME_MESSAGE);

        Ok(self.snapshot().await)
    }

    /// Advance to the next question and narrate it; at the last
    /// question, narrate the closing prompt and stay put.
    pub async fn next_question(&self) -> Result<usize, SessionError> {
        if self.phase().await != SessionPhase::Recording {
            return Err(SessionError::NotRecording);
        }

        let outcome = self.sequencer.lock().await.advance();
        match outcome {
            AdvanceOutcome::Advanced(question) => {
                let _ = self.events_tx.send(SessionEvent::QuestionChanged {
                    index: question.index,
                    text: question.text.clone(),
                });
                self.narrator.narrate(&question.text);
                Ok(question.index)
            }
            AdvanceOutcome::AtEnd => {
                self.narrator.narrate(CLOSING_MESSAGE);
                Ok(self.sequencer.lock().await.cursor())
            }
        }
    }

    /// Recording → Stopping → Submitted/Failed. Calling from any other
    /// phase is a no-op, so double-stop never throws or double-submits.
    pub async fn stop(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock().await;
            if state.phase != SessionPhase::Recording {
                return Ok(());
            }
            state.phase = SessionPhase::Stopping;
        }
        self.emit_phase().await;

        // Stop every producer before flushing the summary; once these
        // return, no further chunk or violation is generated.
        if let Some(aux) = self.aux.lock().await.take() {
            aux.cancel.cancel();
            for handle in aux.handles {
                if let Err(err) = handle.await {
                    log_warn!("session task failed to join: {err}");
                }
            }
        }
        if let Err(err) = self.detection.lock().await.stop().await {
            log_error!("detection loop stop failed: {err:?}");
        }
        self.capture.lock().await.stop().await;
        self.narrator.cancel();
        self.violations.lock().await.shutdown();

        let summary = self.proctoring.lock().await.summary();
        let Some(pipeline) = self.pipeline.lock().await.clone() else {
            let err = BackendError::Transport("upload pipeline missing".into());
            self.fail_stop(err.user_message()).await;
            return Err(SessionError::Submission(err));
        };

        let result = match pipeline.upload_final(&summary).await {
            Ok(()) => pipeline.finish().await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                self.state.lock().await.submitted(Utc::now());
                self.emit_phase().await;
                log_info!("attempt {} submitted", pipeline.attempt_id());
                Ok(())
            }
            Err(err) => {
                self.fail_stop(err.user_message()).await;
                Err(SessionError::Submission(err))
            }
        }
    }

    async fn spawn_aux_tasks(&self, question_cursor: Arc<AtomicUsize>) {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        handles.push(tokio::spawn(input_listener(
            self.input_source.subscribe(),
            Arc::clone(&self.proctoring),
            Arc::clone(&self.violations),
            question_cursor,
            cancel.child_token(),
        )));

        // First question narration, scheduled after the welcome message.
        let narrator = Arc::clone(&self.narrator);
        let events_tx = self.events_tx.clone();
        let first_question = self.sequencer.lock().await.current().text.clone();
        let delay = Duration::from_millis(self.config.first_question_delay_ms);
        let token = cancel.child_token();
        handles.push(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = events_tx.send(SessionEvent::QuestionChanged {
                        index: 0,
                        text: first_question.clone(),
                    });
                    narrator.narrate(&first_question);
                }
                _ = token.cancelled() => {}
            }
        }));

        *self.aux.lock().await = Some(AuxTasks { cancel, handles });
    }

    async fn fail_start(&self, message: String) {
        {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::Idle;
            state.failure_message = Some(message);
        }
        self.emit_phase().await;
    }

    async fn fail_stop(&self, message: String) {
        self.state.lock().await.failed(Utc::now(), message);
        self.emit_phase().await;
    }

    async fn emit_phase(&self) {
        let phase = self.state.lock().await.phase;
        let _ = self.events_tx.send(SessionEvent::PhaseChanged {
            phase,
            timestamp: Utc::now(),
        });
    }
}

/// Forward input anomalies into the proctoring accumulator and the
/// violation log for the lifetime of the Recording phase.
async fn input_listener(
    mut rx: mpsc::UnboundedReceiver<InputAnomaly>,
    proctoring: Arc<Mutex<ProctoringState>>,
    violations: Arc<Mutex<ViolationAggregator>>,
    question_cursor: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            anomaly = rx.recv() => {
                let Some(anomaly) = anomaly else { break };
                let question_index = question_cursor.load(Ordering::Relaxed);
                match anomaly {
                    InputAnomaly::FocusLost => {
                        proctoring.lock().await.record_tab_blur();
                        violations.lock().await.record(
                            ViolationType::TabBlur,
                            "Switched away from the interview tab",
                            question_index,
                        );
                    }
                    InputAnomaly::PasteDetected => {
                        proctoring.lock().await.record_paste();
                        violations.lock().await.record(
                            ViolationType::Paste,
                            "Paste detected in the answer editor",
                            question_index,
                        );
                    }
                }
            }
        }
    }
}
