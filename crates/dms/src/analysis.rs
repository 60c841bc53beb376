//! DMS analysis results and events

use serde::{Deserialize, Serialize};

use crate::geometry::RatioSample;
use crate::state::{DrowsinessLevel, EarTrend};

/// Discrete events emitted while evaluating a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DmsEvent {
    /// Eyes reopened after any closure, however short
    Blink { timestamp_ms: u64, closed_ms: u64 },

    /// Mouth closed after staying open longer than a second
    Yawn { timestamp_ms: u64, duration_ms: u64 },

    /// Eyes stayed closed for the configured drowsy duration
    AlertRaised { timestamp_ms: u64, closed_ms: u64 },

    /// Drowsiness score decayed below the clear level
    AlertCleared { timestamp_ms: u64, score: f32 },

    /// No face for the configured number of consecutive frames
    FaceLost { timestamp_ms: u64, absent_frames: u32 },
}

impl DmsEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match *self {
            DmsEvent::Blink { timestamp_ms, .. }
            | DmsEvent::Yawn { timestamp_ms, .. }
            | DmsEvent::AlertRaised { timestamp_ms, .. }
            | DmsEvent::AlertCleared { timestamp_ms, .. }
            | DmsEvent::FaceLost { timestamp_ms, .. } => timestamp_ms,
        }
    }

    /// Whether this event switches the alert on or off
    pub fn is_alert_transition(&self) -> bool {
        matches!(self, DmsEvent::AlertRaised { .. } | DmsEvent::AlertCleared { .. })
    }
}

/// Observable state after one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Ratios of this frame (if a face was detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratios: Option<RatioSample>,

    /// Drowsiness score (0-100)
    pub drowsiness_score: f32,

    pub drowsiness_level: DrowsinessLevel,

    /// Whether the drowsiness alert is on
    pub is_alerting: bool,

    pub eyes_closed: bool,
    pub is_yawning: bool,

    pub blink_count: u32,
    pub yawn_count: u32,
    pub alert_count: u32,

    /// Fraction of recent frames with closed eyes
    pub perclos: f32,

    /// Several yawns within the fatigue window
    pub frequent_yawning: bool,

    /// Direction of the recent eye aspect ratio
    pub ear_trend: EarTrend,

    /// Yawns per minute of observed time
    pub yawns_per_minute: f32,

    /// Events emitted by this frame
    pub events: Vec<DmsEvent>,
}

impl DmsAnalysis {
    /// Check if this frame emitted any events
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Alert raise/clear emitted by this frame, if any
    pub fn alert_transition(&self) -> Option<DmsEvent> {
        self.events.iter().find(|e| e.is_alert_transition()).copied()
    }
}

/// Counters of one monitoring session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub frames_without_face: u64,
    pub blink_count: u32,
    pub yawn_count: u32,
    pub alert_count: u32,
}
