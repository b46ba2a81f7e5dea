//! Head-pose estimation from facial landmarks.
//!
//! These are heuristic approximations intended as distraction proxies,
//! not calibrated biometrics: yaw comes from the nose tip's horizontal
//! offset against the eye axis, pitch from the mouth's vertical offset
//! within the eye-to-jaw span.

use super::FaceLandmarks;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub yaw_deg: f32,
    pub pitch_deg: f32,
}

/// Full nose offset to one eye maps to roughly half a right angle.
const YAW_SCALE_DEG: f32 = 90.0;

/// Fraction of the eye-to-jaw span where the mouth sits on a frontal face.
const PITCH_NEUTRAL_RATIO: f32 = 0.5;
const PITCH_SCALE_DEG: f32 = 100.0;

/// Geometry too degenerate to normalize (coincident eyes, jaw above the
/// eye line) yields `None` rather than a wild estimate.
const MIN_NORMALIZER_PX: f32 = 1.0;

pub fn estimate_head_pose(landmarks: &FaceLandmarks) -> Option<HeadPose> {
    let eye_center_x = (landmarks.left_eye.x + landmarks.right_eye.x) / 2.0;
    let eye_center_y = (landmarks.left_eye.y + landmarks.right_eye.y) / 2.0;

    let dx = landmarks.right_eye.x - landmarks.left_eye.x;
    let dy = landmarks.right_eye.y - landmarks.left_eye.y;
    let inter_eye = (dx * dx + dy * dy).sqrt();
    if inter_eye < MIN_NORMALIZER_PX {
        return None;
    }

    let face_height = landmarks.jaw_bottom.y - eye_center_y;
    if face_height < MIN_NORMALIZER_PX {
        return None;
    }

    let yaw_deg = (landmarks.nose_tip.x - eye_center_x) / inter_eye * YAW_SCALE_DEG;

    let mouth_ratio = (landmarks.mouth_center.y - eye_center_y) / face_height;
    let pitch_deg = (mouth_ratio - PITCH_NEUTRAL_RATIO) * PITCH_SCALE_DEG;

    Some(HeadPose { yaw_deg, pitch_deg })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point;

    fn frontal() -> FaceLandmarks {
        FaceLandmarks {
            left_eye: Point { x: 100.0, y: 100.0 },
            right_eye: Point { x: 160.0, y: 100.0 },
            nose_tip: Point { x: 130.0, y: 130.0 },
            mouth_center: Point { x: 130.0, y: 150.0 },
            jaw_bottom: Point { x: 130.0, y: 200.0 },
        }
    }

    #[test]
    fn frontal_face_is_near_neutral() {
        let pose = estimate_head_pose(&frontal()).unwrap();
        assert!(pose.yaw_deg.abs() < 1.0, "yaw was {}", pose.yaw_deg);
        assert!(pose.pitch_deg.abs() < 1.0, "pitch was {}", pose.pitch_deg);
    }

    #[test]
    fn nose_offset_reads_as_yaw() {
        let mut landmarks = frontal();
        // Nose pushed 40% of the inter-eye distance to the right.
        landmarks.nose_tip.x = 154.0;
        let pose = estimate_head_pose(&landmarks).unwrap();
        assert!(pose.yaw_deg > 30.0, "yaw was {}", pose.yaw_deg);

        landmarks.nose_tip.x = 106.0;
        let pose = estimate_head_pose(&landmarks).unwrap();
        assert!(pose.yaw_deg < -30.0, "yaw was {}", pose.yaw_deg);
    }

    #[test]
    fn low_mouth_reads_as_pitch() {
        let mut landmarks = frontal();
        landmarks.mouth_center.y = 180.0;
        let pose = estimate_head_pose(&landmarks).unwrap();
        assert!(pose.pitch_deg > 25.0, "pitch was {}", pose.pitch_deg);
    }

    #[test]
    fn degenerate_geometry_yields_none() {
        let mut landmarks = frontal();
        landmarks.right_eye = landmarks.left_eye;
        assert!(estimate_head_pose(&landmarks).is_none());

        let mut landmarks = frontal();
        landmarks.jaw_bottom.y = 90.0;
        assert!(estimate_head_pose(&landmarks).is_none());
    }
}
