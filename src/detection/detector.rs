//! Presence/identity detector capability and its selection.

use std::sync::Arc;

use image::RgbaImage;
use tokio::time::Duration;

use crate::config::ProctorConfig;
use crate::error::DetectError;

use super::DetectedFace;

/// External face detection capability (platform-native or ML model).
pub trait FaceDetector: Send + Sync {
    fn detect_faces(&self, frame: &RgbaImage) -> Result<Vec<DetectedFace>, DetectError>;
}

/// The detector backend for one session, selected once at start so the
/// detection loop is agnostic to which one is active.
#[derive(Clone)]
pub enum PresenceDetector {
    Native(Arc<dyn FaceDetector>),
    Model(Arc<dyn FaceDetector>),
    PixelHeuristic,
    Unavailable,
}

impl PresenceDetector {
    /// Prefer the platform-native detector, then the ML model, then the
    /// crude pixel heuristic when permitted. `Unavailable` leaves the
    /// session unmonitored rather than failing it.
    pub fn select(
        native: Option<Arc<dyn FaceDetector>>,
        model: Option<Arc<dyn FaceDetector>>,
        allow_pixel_fallback: bool,
    ) -> Self {
        if let Some(detector) = native {
            return PresenceDetector::Native(detector);
        }
        if let Some(detector) = model {
            return PresenceDetector::Model(detector);
        }
        if allow_pixel_fallback {
            return PresenceDetector::PixelHeuristic;
        }
        PresenceDetector::Unavailable
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PresenceDetector::Native(_) => "native",
            PresenceDetector::Model(_) => "model",
            PresenceDetector::PixelHeuristic => "pixel-heuristic",
            PresenceDetector::Unavailable => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, PresenceDetector::Unavailable)
    }

    /// The model pipeline is heavier but samples faster per source
    /// behavior; native and pixel modes tick on the slower cadence.
    pub fn tick_interval(&self, config: &ProctorConfig) -> Duration {
        match self {
            PresenceDetector::Model(_) => Duration::from_millis(config.model_detect_interval_ms),
            _ => Duration::from_millis(config.detect_interval_ms),
        }
    }

    pub fn detect(&self, frame: &RgbaImage) -> Result<Vec<DetectedFace>, DetectError> {
        match self {
            PresenceDetector::Native(detector) | PresenceDetector::Model(detector) => {
                detector.detect_faces(frame)
            }
            PresenceDetector::PixelHeuristic => Ok(pixel_presence(frame)),
            PresenceDetector::Unavailable => Err(DetectError::Unsupported),
        }
    }
}

// Pixel-heuristic tuning. A rough webcam presence proxy, not a face
// detector: it reports zero or one face and never landmarks.
const SAMPLE_STEP: u32 = 4;
const MIN_SKIN_RATIO: f32 = 0.035;
const MIN_MEAN_LUMA: f32 = 18.0;

/// Skin-tone pixel ratio over the central region of the frame.
fn pixel_presence(frame: &RgbaImage) -> Vec<DetectedFace> {
    let (width, height) = frame.dimensions();
    if width < SAMPLE_STEP || height < SAMPLE_STEP {
        return Vec::new();
    }

    // Central 60% crop; the subject sits mid-frame in a webcam preview.
    let x0 = width / 5;
    let x1 = width - x0;
    let y0 = height / 5;
    let y1 = height - y0;

    let mut samples = 0u32;
    let mut skin = 0u32;
    let mut luma_sum = 0f32;

    let mut y = y0;
    while y < y1 {
        let mut x = x0;
        while x < x1 {
            let pixel = frame.get_pixel(x, y);
            let (r, g, b) = (pixel[0] as i32, pixel[1] as i32, pixel[2] as i32);
            samples += 1;
            luma_sum += 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            if is_skin_tone(r, g, b) {
                skin += 1;
            }
            x += SAMPLE_STEP;
        }
        y += SAMPLE_STEP;
    }

    if samples == 0 {
        return Vec::new();
    }

    let mean_luma = luma_sum / samples as f32;
    let ratio = skin as f32 / samples as f32;

    // A dark frame (covered lens, lights off) reads as absence even if
    // a few pixels pass the skin rule.
    if mean_luma < MIN_MEAN_LUMA || ratio < MIN_SKIN_RATIO {
        return Vec::new();
    }

    vec![DetectedFace::without_landmarks(ratio.min(1.0))]
}

/// Classic RGB skin classifier (Kovac et al. thresholds).
fn is_skin_tone(r: i32, g: i32, b: i32) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && (max - min) > 15 && (r - g).abs() > 15 && r > g && r > b
}
