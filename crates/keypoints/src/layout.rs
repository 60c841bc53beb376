//! Named landmark layouts
//!
//! A detector emits landmarks in a fixed order. The layout records which
//! indices belong to each eye contour and to the mouth so the geometry code
//! never hard-codes detector-specific numbers.

use serde::{Deserialize, Serialize};

/// Six eye contour points `p1..p6`.
///
/// `p1`/`p4` are the horizontal corners, `p2`/`p6` and `p3`/`p5` the
/// vertical lid pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeLandmarks(pub [usize; 6]);

impl EyeLandmarks {
    /// Six consecutive indices starting at `first`
    pub const fn contiguous(first: usize) -> Self {
        Self([first, first + 1, first + 2, first + 3, first + 4, first + 5])
    }
}

/// Mouth points used for the openness ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouthLandmarks {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

/// Landmark index layout of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkLayout {
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
    pub mouth: MouthLandmarks,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self::face68()
    }
}

impl LandmarkLayout {
    /// 68-point face model, mouth measured on the inner lip contour
    pub const fn face68() -> Self {
        Self {
            left_eye: EyeLandmarks::contiguous(42),
            right_eye: EyeLandmarks::contiguous(36),
            mouth: MouthLandmarks {
                top: 62,
                bottom: 66,
                left: 60,
                right: 64,
            },
        }
    }

    /// 68-point face model, mouth measured on the outer lip contour
    /// (for detectors that do not deliver inner lip points)
    pub const fn face68_outer_lips() -> Self {
        Self {
            mouth: MouthLandmarks {
                top: 51,
                bottom: 57,
                left: 48,
                right: 54,
            },
            ..Self::face68()
        }
    }

    /// Smallest landmark count that covers every index in the layout
    pub fn required_points(&self) -> usize {
        let m = &self.mouth;
        self.left_eye
            .0
            .iter()
            .chain(self.right_eye.0.iter())
            .chain([m.top, m.bottom, m.left, m.right].iter())
            .max()
            .map_or(0, |max| max + 1)
    }
}
