//! Driver state tracking
//!
//! `EstimatorState` is the only mutable part of the drowsiness core. It is
//! owned by one session and advanced once per evaluated frame, strictly in
//! frame order. The caller supplies time through the sample timestamp.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::DmsEvent;
use crate::config::DmsConfig;
use crate::geometry::RatioSample;

/// Mouth opening must last strictly longer than this to count as a yawn
pub const YAWN_MIN_DURATION_MS: u64 = 1000;

/// Score removed per evaluation with open eyes (per frame, not per millisecond)
pub const SCORE_DECAY_PER_FRAME: f32 = 5.0;

/// Alert clears once the score drops strictly below this
pub const ALERT_CLEAR_SCORE: f32 = 30.0;

pub const MAX_SCORE: f32 = 100.0;

/// EARs kept for trend analysis (~1s at 30fps)
pub const EAR_HISTORY_FRAMES: usize = 30;

/// Samples averaged at each end of the EAR history
const TREND_SPAN: usize = 10;

/// Mean EAR shift that counts as a trend
const TREND_DELTA: f32 = 0.02;

/// Observed time below which no yawn rate is reported
const MIN_RATE_WINDOW_MS: u64 = 1000;

/// Drowsiness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrowsinessLevel {
    #[default]
    Normal,
    Mild,
    Moderate,
    High,
}

impl DrowsinessLevel {
    /// Bucket a 0-100 drowsiness score
    pub fn from_score(score: f32) -> Self {
        if score < 25.0 {
            DrowsinessLevel::Normal
        } else if score < 50.0 {
            DrowsinessLevel::Mild
        } else if score < 75.0 {
            DrowsinessLevel::Moderate
        } else {
            DrowsinessLevel::High
        }
    }
}

/// Direction of the recent eye aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarTrend {
    #[default]
    Stable,
    Declining,
    Recovering,
}

/// Per-session estimator state
#[derive(Debug, Clone, Default)]
pub struct EstimatorState {
    eye_closed_since: Option<u64>,
    is_blinking: bool,
    is_yawning: bool,
    yawn_started_at: Option<u64>,
    drowsiness_score: f32,
    is_alerting: bool,
    blink_count: u32,
    yawn_count: u32,
    alert_count: u32,
    first_timestamp_ms: Option<u64>,
    last_timestamp_ms: Option<u64>,
    /// Latest mean EARs, oldest first
    ear_history: VecDeque<f32>,
    /// Eye-closed flag per evaluation (for PERCLOS)
    closed_history: VecDeque<bool>,
    /// Timestamps of counted yawns inside the fatigue window
    recent_yawns: VecDeque<u64>,
}

impl EstimatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the state by one frame and return the events it produced
    pub fn evaluate(&mut self, sample: &RatioSample, config: &DmsConfig) -> Vec<DmsEvent> {
        let now = sample.timestamp_ms;
        if let Some(last) = self.last_timestamp_ms {
            if now < last {
                warn!(now, last, "Frame timestamp went backwards; durations clamp to zero");
            }
        }
        self.last_timestamp_ms = Some(now);
        self.first_timestamp_ms.get_or_insert(now);

        self.ear_history.push_back(sample.ear);
        if self.ear_history.len() > EAR_HISTORY_FRAMES {
            self.ear_history.pop_front();
        }

        let mut events = Vec::new();
        let eyes_closed = sample.ear < config.ear_threshold;

        self.update_yawn(sample.mar > config.mar_threshold, now, config, &mut events);
        self.update_eyes(eyes_closed, now, config, &mut events);

        if self.is_alerting && self.drowsiness_score < ALERT_CLEAR_SCORE {
            self.is_alerting = false;
            info!(score = self.drowsiness_score, "Drowsiness alert cleared");
            events.push(DmsEvent::AlertCleared {
                timestamp_ms: now,
                score: self.drowsiness_score,
            });
        }

        self.closed_history.push_back(eyes_closed);
        while self.closed_history.len() > config.perclos_window_frames {
            self.closed_history.pop_front();
        }

        events
    }

    fn update_eyes(
        &mut self,
        eyes_closed: bool,
        now: u64,
        config: &DmsConfig,
        events: &mut Vec<DmsEvent>,
    ) {
        if eyes_closed {
            self.is_blinking = true;
            let since = *self.eye_closed_since.get_or_insert(now);
            let closed_ms = now.saturating_sub(since);

            // Zero durations are rejected at config update; guard anyway
            let ramp_ms = config.drowsy_duration_ms.max(1);
            let ramp = MAX_SCORE * closed_ms as f32 / ramp_ms as f32;
            // A fresh closure climbs from the decayed score, never below it
            self.drowsiness_score = self.drowsiness_score.max(ramp).min(MAX_SCORE);

            if closed_ms >= config.drowsy_duration_ms && !self.is_alerting {
                self.is_alerting = true;
                self.alert_count += 1;
                warn!(closed_ms, alert_count = self.alert_count, "Drowsiness alert raised");
                events.push(DmsEvent::AlertRaised {
                    timestamp_ms: now,
                    closed_ms,
                });
            }
        } else {
            if self.is_blinking {
                self.is_blinking = false;
                self.blink_count += 1;
                let closed_ms = self
                    .eye_closed_since
                    .map_or(0, |since| now.saturating_sub(since));
                debug!(closed_ms, total = self.blink_count, "Blink detected");
                events.push(DmsEvent::Blink {
                    timestamp_ms: now,
                    closed_ms,
                });
            }
            self.eye_closed_since = None;
            self.drowsiness_score = (self.drowsiness_score - SCORE_DECAY_PER_FRAME).max(0.0);
        }
    }

    fn update_yawn(
        &mut self,
        mouth_open: bool,
        now: u64,
        config: &DmsConfig,
        events: &mut Vec<DmsEvent>,
    ) {
        if mouth_open && !self.is_yawning {
            self.is_yawning = true;
            self.yawn_started_at = Some(now);
        } else if !mouth_open && self.is_yawning {
            self.is_yawning = false;
            let started = self.yawn_started_at.take().unwrap_or(now);
            let duration_ms = now.saturating_sub(started);

            if duration_ms > YAWN_MIN_DURATION_MS {
                self.yawn_count += 1;
                self.recent_yawns.push_back(now);
                debug!(duration_ms, total = self.yawn_count, "Yawn detected");
                events.push(DmsEvent::Yawn {
                    timestamp_ms: now,
                    duration_ms,
                });
            } else {
                debug!(duration_ms, "Mouth opening too short for a yawn");
            }
        }

        let cutoff = now.saturating_sub(config.yawn_fatigue_window_ms);
        while self.recent_yawns.front().is_some_and(|&t| t < cutoff) {
            self.recent_yawns.pop_front();
        }
    }

    pub fn drowsiness_score(&self) -> f32 {
        self.drowsiness_score
    }

    pub fn drowsiness_level(&self) -> DrowsinessLevel {
        DrowsinessLevel::from_score(self.drowsiness_score)
    }

    pub fn is_alerting(&self) -> bool {
        self.is_alerting
    }

    /// Eyes currently below the EAR threshold
    pub fn eyes_closed(&self) -> bool {
        self.is_blinking
    }

    pub fn is_yawning(&self) -> bool {
        self.is_yawning
    }

    /// Start of the current eye closure
    pub fn eye_closed_since(&self) -> Option<u64> {
        self.eye_closed_since
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    pub fn yawn_count(&self) -> u32 {
        self.yawn_count
    }

    pub fn alert_count(&self) -> u32 {
        self.alert_count
    }

    /// Calculate PERCLOS (Percentage of Eye Closure) over the recent window
    pub fn perclos(&self) -> f32 {
        if self.closed_history.is_empty() {
            return 0.0;
        }
        let closed = self.closed_history.iter().filter(|&&c| c).count();
        closed as f32 / self.closed_history.len() as f32
    }

    /// Whether enough yawns fell inside the fatigue window
    pub fn frequent_yawning(&self, config: &DmsConfig) -> bool {
        self.recent_yawns.len() >= config.yawn_fatigue_count
    }

    /// Compare the newest EARs with the oldest ones in the history
    pub fn ear_trend(&self) -> EarTrend {
        let len = self.ear_history.len();
        if len < TREND_SPAN {
            return EarTrend::Stable;
        }
        let older: f32 = self.ear_history.iter().take(TREND_SPAN).sum();
        let recent: f32 = self.ear_history.range(len - TREND_SPAN..).sum();

        let diff = (recent - older) / TREND_SPAN as f32;
        if diff < -TREND_DELTA {
            EarTrend::Declining
        } else if diff > TREND_DELTA {
            EarTrend::Recovering
        } else {
            EarTrend::Stable
        }
    }

    /// Counted yawns per minute since the first evaluated frame
    pub fn yawns_per_minute(&self) -> f32 {
        let (Some(first), Some(last)) = (self.first_timestamp_ms, self.last_timestamp_ms) else {
            return 0.0;
        };
        let observed_ms = last.saturating_sub(first);
        if observed_ms < MIN_RATE_WINDOW_MS {
            return 0.0;
        }
        self.yawn_count as f32 * 60_000.0 / observed_ms as f32
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: f32 = 0.3;
    const CLOSED: f32 = 0.1;

    fn config() -> DmsConfig {
        DmsConfig::default()
    }

    fn eyes(state: &mut EstimatorState, ear: f32, t: u64, config: &DmsConfig) -> Vec<DmsEvent> {
        state.evaluate(&RatioSample::new(ear, 0.0, t), config)
    }

    fn mouth(state: &mut EstimatorState, mar: f32, t: u64, config: &DmsConfig) -> Vec<DmsEvent> {
        state.evaluate(&RatioSample::new(OPEN, mar, t), config)
    }

    #[test]
    fn test_single_frame_closure_is_a_blink() {
        let config = config();
        let mut state = EstimatorState::new();

        assert!(eyes(&mut state, CLOSED, 0, &config).is_empty());
        assert_eq!(state.blink_count(), 0);

        let events = eyes(&mut state, OPEN, 1, &config);
        assert_eq!(events, vec![DmsEvent::Blink { timestamp_ms: 1, closed_ms: 1 }]);
        assert_eq!(state.blink_count(), 1);

        eyes(&mut state, OPEN, 2, &config);
        eyes(&mut state, OPEN, 3, &config);
        assert_eq!(state.blink_count(), 1);
    }

    #[test]
    fn test_long_closure_counts_one_blink() {
        let config = config();
        let mut state = EstimatorState::new();
        for t in (0..5000).step_by(33) {
            eyes(&mut state, CLOSED, t, &config);
        }
        eyes(&mut state, OPEN, 5000, &config);
        assert_eq!(state.blink_count(), 1);
    }

    #[test]
    fn test_yawn_duration_gate() {
        let config = config();
        let mut state = EstimatorState::new();

        mouth(&mut state, 1.0, 0, &config);
        assert!(state.is_yawning());
        assert!(mouth(&mut state, 0.2, 999, &config).is_empty());
        assert_eq!(state.yawn_count(), 0);

        mouth(&mut state, 1.0, 2000, &config);
        let events = mouth(&mut state, 0.2, 3001, &config);
        assert_eq!(events, vec![DmsEvent::Yawn { timestamp_ms: 3001, duration_ms: 1001 }]);
        assert_eq!(state.yawn_count(), 1);
    }

    #[test]
    fn test_yawn_of_exactly_one_second_is_discarded() {
        let config = config();
        let mut state = EstimatorState::new();
        mouth(&mut state, 1.0, 0, &config);
        mouth(&mut state, 1.0, 500, &config);
        mouth(&mut state, 0.0, 1000, &config);
        assert_eq!(state.yawn_count(), 0);
    }

    #[test]
    fn test_score_ramp_and_single_alert() {
        let config = config();
        let mut state = EstimatorState::new();

        eyes(&mut state, CLOSED, 0, &config);
        assert_eq!(state.drowsiness_score(), 0.0);

        eyes(&mut state, CLOSED, 1000, &config);
        assert_eq!(state.drowsiness_score(), 50.0);
        assert!(!state.is_alerting());

        let events = eyes(&mut state, CLOSED, 2000, &config);
        assert_eq!(state.drowsiness_score(), 100.0);
        assert!(state.is_alerting());
        assert_eq!(events, vec![DmsEvent::AlertRaised { timestamp_ms: 2000, closed_ms: 2000 }]);

        for t in [2033, 2500, 4000, 10_000] {
            assert!(eyes(&mut state, CLOSED, t, &config).is_empty());
        }
        assert_eq!(state.drowsiness_score(), 100.0);
        assert_eq!(state.alert_count(), 1);
    }

    #[test]
    fn test_clear_boundary_is_strict() {
        let config = config();

        let mut state = EstimatorState {
            drowsiness_score: 34.0,
            is_alerting: true,
            alert_count: 1,
            ..Default::default()
        };
        let events = eyes(&mut state, OPEN, 0, &config);
        assert_eq!(state.drowsiness_score(), 29.0);
        assert!(!state.is_alerting());
        assert_eq!(events, vec![DmsEvent::AlertCleared { timestamp_ms: 0, score: 29.0 }]);

        let mut state = EstimatorState {
            drowsiness_score: 35.0,
            is_alerting: true,
            alert_count: 1,
            ..Default::default()
        };
        assert!(eyes(&mut state, OPEN, 0, &config).is_empty());
        assert_eq!(state.drowsiness_score(), 30.0);
        assert!(state.is_alerting());
    }

    #[test]
    fn test_alert_survives_reopening_until_decay() {
        let config = config();
        let mut state = EstimatorState::new();
        eyes(&mut state, CLOSED, 0, &config);
        eyes(&mut state, CLOSED, 2000, &config);
        assert!(state.is_alerting());

        // 100 -> 30 takes 14 open frames, the 15th drops to 25
        let mut t = 2033;
        for _ in 0..14 {
            eyes(&mut state, OPEN, t, &config);
            assert!(state.is_alerting());
            t += 33;
        }
        assert_eq!(state.drowsiness_score(), 30.0);

        let events = eyes(&mut state, OPEN, t, &config);
        assert!(!state.is_alerting());
        assert!(events.iter().any(|e| matches!(e, DmsEvent::AlertCleared { .. })));
        assert_eq!(state.alert_count(), 1);
    }

    #[test]
    fn test_reclosure_after_alert_keeps_alert() {
        let config = config();
        let mut state = EstimatorState::new();
        eyes(&mut state, CLOSED, 0, &config);
        eyes(&mut state, CLOSED, 2000, &config);
        assert!(state.is_alerting());

        eyes(&mut state, OPEN, 2033, &config);
        assert_eq!(state.drowsiness_score(), 95.0);

        // eyes shut again right after a blink: score holds, alert stays on
        let events = eyes(&mut state, CLOSED, 2066, &config);
        assert!(events.is_empty());
        assert_eq!(state.drowsiness_score(), 95.0);
        assert!(state.is_alerting());

        eyes(&mut state, CLOSED, 4066, &config);
        assert_eq!(state.drowsiness_score(), 100.0);
        assert!(state.is_alerting());
        assert_eq!(state.alert_count(), 1);
    }

    #[test]
    fn test_reclosure_ramps_from_decayed_score() {
        let config = config();
        let mut state = EstimatorState::new();
        eyes(&mut state, CLOSED, 0, &config);
        eyes(&mut state, CLOSED, 1000, &config);
        eyes(&mut state, OPEN, 1033, &config);
        assert_eq!(state.drowsiness_score(), 45.0);

        eyes(&mut state, CLOSED, 1066, &config);
        assert_eq!(state.drowsiness_score(), 45.0);
        // 1000ms into the new closure the ramp (50) overtakes the held score
        eyes(&mut state, CLOSED, 2066, &config);
        assert_eq!(state.drowsiness_score(), 50.0);
    }

    #[test]
    fn test_ear_trend() {
        let config = config();
        let mut state = EstimatorState::new();
        for t in 0..9 {
            eyes(&mut state, 0.35, t * 33, &config);
        }
        assert_eq!(state.ear_trend(), EarTrend::Stable);

        for t in 9..20 {
            eyes(&mut state, 0.35, t * 33, &config);
        }
        assert_eq!(state.ear_trend(), EarTrend::Stable);

        for t in 20..30 {
            eyes(&mut state, 0.28, t * 33, &config);
        }
        assert_eq!(state.ear_trend(), EarTrend::Declining);

        // history keeps 30 frames: the 0.35 block scrolls out
        for t in 30..50 {
            eyes(&mut state, 0.28, t * 33, &config);
        }
        for t in 50..60 {
            eyes(&mut state, 0.33, t * 33, &config);
        }
        assert_eq!(state.ear_trend(), EarTrend::Recovering);
    }

    #[test]
    fn test_yawns_per_minute() {
        let config = config();
        let mut state = EstimatorState::new();
        assert_eq!(state.yawns_per_minute(), 0.0);

        mouth(&mut state, 1.0, 0, &config);
        mouth(&mut state, 0.0, 500, &config);
        // too little observed time for a rate
        assert_eq!(state.yawns_per_minute(), 0.0);

        mouth(&mut state, 1.0, 10_000, &config);
        mouth(&mut state, 0.0, 12_000, &config);
        mouth(&mut state, 1.0, 20_000, &config);
        mouth(&mut state, 0.0, 22_000, &config);
        mouth(&mut state, 0.0, 30_000, &config);
        assert_eq!(state.yawn_count(), 2);
        // 2 yawns over 30s
        assert!((state.yawns_per_minute() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let config = config();
        let mut state = EstimatorState::new();
        eyes(&mut state, CLOSED, 0, &config);
        eyes(&mut state, CLOSED, 60, &config);
        assert!(state.drowsiness_score() > 0.0);
        eyes(&mut state, OPEN, 90, &config);
        assert_eq!(state.drowsiness_score(), 0.0);
        assert_eq!(state.eye_closed_since(), None);
    }

    #[test]
    fn test_threshold_change_is_not_retroactive() {
        let mut config = config();
        let mut state = EstimatorState::new();

        eyes(&mut state, 0.22, 0, &config);
        assert!(state.eyes_closed());
        assert_eq!(state.eye_closed_since(), Some(0));

        // Lowering the threshold reclassifies the same EAR as open from now on
        config.ear_threshold = 0.2;
        eyes(&mut state, 0.22, 33, &config);
        assert!(!state.eyes_closed());
        assert_eq!(state.blink_count(), 1);
        assert_eq!(state.perclos(), 0.5);
    }

    #[test]
    fn test_backwards_timestamp_clamps() {
        let config = config();
        let mut state = EstimatorState::new();
        eyes(&mut state, CLOSED, 1000, &config);
        eyes(&mut state, CLOSED, 500, &config);
        assert_eq!(state.drowsiness_score(), 0.0);
        assert!(!state.is_alerting());
    }

    #[test]
    fn test_perclos_window() {
        let config = DmsConfig {
            perclos_window_frames: 4,
            ..Default::default()
        };
        let mut state = EstimatorState::new();
        assert_eq!(state.perclos(), 0.0);

        for (i, ear) in [CLOSED, CLOSED, OPEN, OPEN, OPEN, CLOSED].into_iter().enumerate() {
            eyes(&mut state, ear, i as u64 * 33, &config);
        }
        // window holds [OPEN, OPEN, OPEN, CLOSED]
        assert_eq!(state.perclos(), 0.25);
    }

    #[test]
    fn test_frequent_yawning_window() {
        let config = DmsConfig {
            yawn_fatigue_count: 2,
            yawn_fatigue_window_ms: 10_000,
            ..Default::default()
        };
        let mut state = EstimatorState::new();

        mouth(&mut state, 1.0, 0, &config);
        mouth(&mut state, 0.0, 1500, &config);
        assert!(!state.frequent_yawning(&config));

        mouth(&mut state, 1.0, 3000, &config);
        mouth(&mut state, 0.0, 4500, &config);
        assert!(state.frequent_yawning(&config));

        // first yawn (t=1500) falls out of the window
        mouth(&mut state, 0.0, 12_000, &config);
        assert!(!state.frequent_yawning(&config));
        assert_eq!(state.yawn_count(), 2);
    }

    #[test]
    fn test_drowsiness_levels() {
        assert_eq!(DrowsinessLevel::from_score(0.0), DrowsinessLevel::Normal);
        assert_eq!(DrowsinessLevel::from_score(25.0), DrowsinessLevel::Mild);
        assert_eq!(DrowsinessLevel::from_score(50.0), DrowsinessLevel::Moderate);
        assert_eq!(DrowsinessLevel::from_score(100.0), DrowsinessLevel::High);
    }

    #[test]
    fn test_reset() {
        let config = config();
        let mut state = EstimatorState::new();
        eyes(&mut state, CLOSED, 0, &config);
        eyes(&mut state, OPEN, 33, &config);
        state.reset();
        assert_eq!(state.blink_count(), 0);
        assert_eq!(state.perclos(), 0.0);
        assert_eq!(state.ear_trend(), EarTrend::Stable);
        assert_eq!(state.yawns_per_minute(), 0.0);
    }
}
