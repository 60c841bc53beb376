//! Facial Keypoint Input Boundary
//!
//! Types describing what an external landmark detector hands to the
//! drowsiness core:
//! - Points and per-frame keypoint sets
//! - Named landmark layouts (which index is which eye corner, lip point, ...)
//! - The `LandmarkSource` seam that any detector plugs into

pub mod frame;
pub mod layout;

pub use frame::{KeypointFrame, Point};
pub use layout::{EyeLandmarks, LandmarkLayout, MouthLandmarks};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keypoint source error types
#[derive(Error, Debug)]
pub enum KeypointError {
    #[error("Failed to read landmark source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed landmark record on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Landmark detector failed: {0}")]
    Detector(String),
}

/// Outcome of running the landmark detector on one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Detection {
    /// A face was found and its keypoints extracted
    Face(KeypointFrame),

    /// The detector ran but found no face
    NoFace { timestamp_ms: u64 },
}

impl Detection {
    /// Capture time of the underlying frame
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Detection::Face(frame) => frame.timestamp_ms,
            Detection::NoFace { timestamp_ms } => *timestamp_ms,
        }
    }

    pub fn face(&self) -> Option<&KeypointFrame> {
        match self {
            Detection::Face(frame) => Some(frame),
            Detection::NoFace { .. } => None,
        }
    }
}

/// A landmark detector fed by some frame provider (camera, file, network).
///
/// Each call covers exactly one frame. `Ok(None)` means the provider has no
/// more frames and the session should end.
#[allow(async_fn_in_trait)]
pub trait LandmarkSource {
    async fn detect(&mut self) -> Result<Option<Detection>, KeypointError>;
}
