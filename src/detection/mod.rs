//! Presence detection: detector capabilities, head-pose estimation,
//! and the periodic detection loop.

pub mod detector;
pub mod loop_worker;
pub mod pose;

use serde::{Deserialize, Serialize};

pub use detector::{FaceDetector, PresenceDetector};
pub use loop_worker::DetectionController;
pub use pose::HeadPose;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Landmark positions in frame pixel coordinates. Detectors that only
/// report presence leave them out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: Point,
    pub right_eye: Point,
    pub nose_tip: Point,
    pub mouth_center: Point,
    pub jaw_bottom: Point,
}

#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub confidence: f32,
    pub landmarks: Option<FaceLandmarks>,
}

impl DetectedFace {
    pub fn without_landmarks(confidence: f32) -> Self {
        Self {
            confidence,
            landmarks: None,
        }
    }
}
