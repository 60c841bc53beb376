//! Driver Monitoring System (DMS)
//!
//! Drowsiness estimation from facial keypoints:
//! - Eye and mouth aspect ratios (EAR/MAR)
//! - Blink and yawn events
//! - Drowsiness score with a hysteresis-gated alert
//! - PERCLOS and frequent-yawning indicators

pub mod analysis;
pub mod config;
pub mod geometry;
pub mod state;

pub use analysis::{DmsAnalysis, DmsEvent, SessionStats};
pub use config::DmsConfig;
pub use geometry::{extract, RatioSample};
pub use state::{DrowsinessLevel, EarTrend, EstimatorState};

use keypoints::{Detection, LandmarkLayout};
use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// One driver monitoring session
///
/// Owns the estimator state for as long as monitoring runs. Configuration
/// is passed in on every call so edits apply from the next frame on.
pub struct DmsSession {
    layout: LandmarkLayout,
    state: EstimatorState,
    face_absent_frames: u32,
    /// FaceLost already emitted for the current absence streak
    face_lost_reported: bool,
    frames_processed: u64,
    frames_without_face: u64,
}

impl DmsSession {
    /// Create a new session for detectors using `layout`
    pub fn new(layout: LandmarkLayout) -> Self {
        info!(?layout, "Starting DMS session");
        Self {
            layout,
            state: EstimatorState::new(),
            face_absent_frames: 0,
            face_lost_reported: false,
            frames_processed: 0,
            frames_without_face: 0,
        }
    }

    /// Process the detector output of a single frame
    pub fn process(&mut self, detection: &Detection, config: &DmsConfig) -> DmsAnalysis {
        self.frames_processed += 1;

        let Some(frame) = detection.face() else {
            // No face is not evidence of closed eyes: the estimator is left untouched
            self.frames_without_face += 1;
            self.face_absent_frames = self.face_absent_frames.saturating_add(1);

            let mut events = Vec::new();
            // `>=` so a limit lowered mid-streak still reports once
            if !self.face_lost_reported
                && self.face_absent_frames >= config.face_absent_frames_limit
            {
                self.face_lost_reported = true;
                info!(frames = self.face_absent_frames, "Face not visible");
                events.push(DmsEvent::FaceLost {
                    timestamp_ms: detection.timestamp_ms(),
                    absent_frames: self.face_absent_frames,
                });
            }
            return self.snapshot(None, events, config);
        };

        self.face_absent_frames = 0;
        self.face_lost_reported = false;
        let sample = extract(frame, &self.layout);
        let events = self.state.evaluate(&sample, config);
        if !events.is_empty() {
            debug!(?events, "Frame events");
        }

        self.snapshot(Some(sample), events, config)
    }

    fn snapshot(
        &self,
        ratios: Option<RatioSample>,
        events: Vec<DmsEvent>,
        config: &DmsConfig,
    ) -> DmsAnalysis {
        DmsAnalysis {
            face_detected: ratios.is_some(),
            ratios,
            drowsiness_score: self.state.drowsiness_score(),
            drowsiness_level: self.state.drowsiness_level(),
            is_alerting: self.state.is_alerting(),
            eyes_closed: self.state.eyes_closed(),
            is_yawning: self.state.is_yawning(),
            blink_count: self.state.blink_count(),
            yawn_count: self.state.yawn_count(),
            alert_count: self.state.alert_count(),
            perclos: self.state.perclos(),
            frequent_yawning: self.state.frequent_yawning(config),
            ear_trend: self.state.ear_trend(),
            yawns_per_minute: self.state.yawns_per_minute(),
            events,
        }
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn layout(&self) -> &LandmarkLayout {
        &self.layout
    }

    /// Session counters
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.frames_processed,
            frames_without_face: self.frames_without_face,
            blink_count: self.state.blink_count(),
            yawn_count: self.state.yawn_count(),
            alert_count: self.state.alert_count(),
        }
    }

    /// Reset driver state (on driver change)
    pub fn reset(&mut self) {
        self.state.reset();
        self.face_absent_frames = 0;
        self.face_lost_reported = false;
        self.frames_processed = 0;
        self.frames_without_face = 0;
        info!("DMS session reset");
    }
}

impl Default for DmsSession {
    fn default() -> Self {
        Self::new(LandmarkLayout::default())
    }
}
