//! Eye and mouth aspect ratios from facial keypoints
//!
//! Pure functions: identical coordinates always give identical ratios, and
//! missing or degenerate geometry falls back to fixed values instead of
//! failing.

use keypoints::{EyeLandmarks, KeypointFrame, LandmarkLayout, MouthLandmarks, Point};
use serde::{Deserialize, Serialize};

/// EAR reported for an eye whose geometry is unusable; reads as "open"
pub const EAR_FALLBACK: f32 = 0.3;

/// MAR reported for a mouth whose geometry is unusable; reads as "closed"
pub const MAR_FALLBACK: f32 = 0.0;

/// Ratios extracted from one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSample {
    /// Mean eye aspect ratio of both eyes
    pub ear: f32,
    /// Mouth aspect ratio
    pub mar: f32,
    /// Capture timestamp of the frame (milliseconds)
    pub timestamp_ms: u64,
    pub left_ear: f32,
    pub right_ear: f32,
}

impl RatioSample {
    /// Sample with both eyes at the same ratio
    pub fn new(ear: f32, mar: f32, timestamp_ms: u64) -> Self {
        Self {
            ear,
            mar,
            timestamp_ms,
            left_ear: ear,
            right_ear: ear,
        }
    }
}

/// Extract EAR and MAR from a keypoint frame
pub fn extract(frame: &KeypointFrame, layout: &LandmarkLayout) -> RatioSample {
    let left_ear = eye_aspect_ratio(frame, &layout.left_eye);
    let right_ear = eye_aspect_ratio(frame, &layout.right_eye);

    RatioSample {
        ear: (left_ear + right_ear) / 2.0,
        mar: mouth_aspect_ratio(frame, &layout.mouth),
        timestamp_ms: frame.timestamp_ms,
        left_ear,
        right_ear,
    }
}

/// EAR = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|)
pub fn eye_aspect_ratio(frame: &KeypointFrame, eye: &EyeLandmarks) -> f32 {
    let mut p = [Point::default(); 6];
    for (slot, &index) in p.iter_mut().zip(eye.0.iter()) {
        match frame.get(index) {
            Some(point) => *slot = point,
            None => return EAR_FALLBACK,
        }
    }

    let horizontal = p[0].distance(&p[3]);
    if horizontal == 0.0 {
        return EAR_FALLBACK;
    }

    (p[1].distance(&p[5]) + p[2].distance(&p[4])) / (2.0 * horizontal)
}

/// MAR = |top-bottom| / |left-right|
pub fn mouth_aspect_ratio(frame: &KeypointFrame, mouth: &MouthLandmarks) -> f32 {
    let points = (
        frame.get(mouth.top),
        frame.get(mouth.bottom),
        frame.get(mouth.left),
        frame.get(mouth.right),
    );
    let (Some(top), Some(bottom), Some(left), Some(right)) = points else {
        return MAR_FALLBACK;
    };

    let horizontal = left.distance(&right);
    if horizontal == 0.0 {
        return MAR_FALLBACK;
    }

    top.distance(&bottom) / horizontal
}
