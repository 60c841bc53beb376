//! Keypoint frame types

use serde::{Deserialize, Serialize};

/// 2D landmark coordinate in frame pixel space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

/// Landmarks produced by the detector for a single video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeypointFrame {
    /// Landmarks in detector order (index = named landmark)
    pub points: Vec<Point>,
    /// Capture timestamp (milliseconds)
    pub timestamp_ms: u64,
}

impl KeypointFrame {
    /// Create a new keypoint frame
    pub fn new(points: Vec<Point>, timestamp_ms: u64) -> Self {
        Self {
            points,
            timestamp_ms,
        }
    }

    /// Build a frame from raw `(x, y)` pairs
    pub fn from_pairs(pairs: &[(f32, f32)], timestamp_ms: u64) -> Self {
        Self::new(pairs.iter().copied().map(Point::from).collect(), timestamp_ms)
    }

    /// Landmark at `index`, or `None` if the detector did not deliver a
    /// usable point there (out of range or non-finite coordinates)
    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied().filter(Point::is_finite)
    }

    /// Number of landmarks in the frame
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_landmarks() {
        let frame = KeypointFrame::from_pairs(&[(1.0, 1.0), (f32::NAN, 2.0)], 0);
        assert_eq!(frame.get(0), Some(Point::new(1.0, 1.0)));
        assert_eq!(frame.get(1), None);
        assert_eq!(frame.get(2), None);
        assert_eq!(frame.len(), 2);
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(ax in -1e3f32..1e3, ay in -1e3f32..1e3, bx in -1e3f32..1e3, by in -1e3f32..1e3) {
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            prop_assert!(a.distance(&b) >= 0.0);
            prop_assert_eq!(a.distance(&b), b.distance(&a));
        }
    }
}
