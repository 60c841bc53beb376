//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// DMS configuration
///
/// Read fresh on every evaluation; edits apply from the next frame on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye aspect ratio below which the eyes count as closed
    pub ear_threshold: f32,

    /// Mouth aspect ratio above which the mouth counts as open
    pub mar_threshold: f32,

    /// Continuous eye closure that saturates the score and raises the alert (milliseconds)
    pub drowsy_duration_ms: u64,

    /// Consecutive frames without a face before reporting the face as lost
    pub face_absent_frames_limit: u32,

    /// Evaluations kept for PERCLOS (~30s at 30fps)
    pub perclos_window_frames: usize,

    /// Yawns within `yawn_fatigue_window_ms` that indicate fatigue
    pub yawn_fatigue_count: usize,

    /// Window for frequent-yawning detection (milliseconds)
    pub yawn_fatigue_window_ms: u64,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            mar_threshold: 0.75,
            drowsy_duration_ms: 2000,
            face_absent_frames_limit: 30,
            perclos_window_frames: 900,
            yawn_fatigue_count: 3,
            yawn_fatigue_window_ms: 60_000,
        }
    }
}

impl DmsConfig {
    /// Create strict config (earlier closure detection, shorter ramp)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.28,
            drowsy_duration_ms: 1500,
            yawn_fatigue_count: 2,
            ..Default::default()
        }
    }

    /// Create lenient config (later closure detection, longer ramp)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.21,
            drowsy_duration_ms: 3000,
            yawn_fatigue_count: 4,
            ..Default::default()
        }
    }

    /// Reject values the estimator cannot work with.
    ///
    /// Thresholds only have to be finite numbers; their range is left to the
    /// caller.
    pub fn validate(&self) -> Result<(), DmsError> {
        if !self.ear_threshold.is_finite() {
            return Err(DmsError::Config(format!(
                "ear_threshold must be a finite number, got {}",
                self.ear_threshold
            )));
        }
        if !self.mar_threshold.is_finite() {
            return Err(DmsError::Config(format!(
                "mar_threshold must be a finite number, got {}",
                self.mar_threshold
            )));
        }
        if self.drowsy_duration_ms == 0 {
            return Err(DmsError::Config(
                "drowsy_duration_ms must be positive".into(),
            ));
        }
        if self.face_absent_frames_limit == 0 {
            return Err(DmsError::Config(
                "face_absent_frames_limit must be positive".into(),
            ));
        }
        if self.perclos_window_frames == 0 {
            return Err(DmsError::Config(
                "perclos_window_frames must be positive".into(),
            ));
        }
        if self.yawn_fatigue_count == 0 || self.yawn_fatigue_window_ms == 0 {
            return Err(DmsError::Config(
                "yawn_fatigue_count and yawn_fatigue_window_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
