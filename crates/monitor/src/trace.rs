//! Recorded landmark traces
//!
//! JSON lines, one frame per line:
//!
//! ```text
//! {"timestamp_ms": 0, "points": [[312.0, 240.5], [318.2, 236.0], ...]}
//! {"timestamp_ms": 33, "points": null}
//! ```
//!
//! Missing, `null` or empty `points` mean the detector found no face.
//! Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use keypoints::{Detection, KeypointError, KeypointFrame, LandmarkSource, Point};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One line of a trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub points: Option<Vec<[f32; 2]>>,
}

impl From<TraceRecord> for Detection {
    fn from(record: TraceRecord) -> Self {
        match record.points {
            Some(points) if !points.is_empty() => Detection::Face(KeypointFrame::new(
                points.into_iter().map(Point::from).collect(),
                record.timestamp_ms,
            )),
            _ => Detection::NoFace {
                timestamp_ms: record.timestamp_ms,
            },
        }
    }
}

/// Landmark source replaying a recorded trace
pub struct TraceSource {
    frames: std::vec::IntoIter<Detection>,
}

impl TraceSource {
    /// Load a trace file
    pub fn open(path: &Path) -> Result<Self, KeypointError> {
        let source = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), frames = source.remaining(), "Loaded landmark trace");
        Ok(source)
    }

    /// Parse a trace from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, KeypointError> {
        let mut frames = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record: TraceRecord =
                serde_json::from_str(trimmed).map_err(|e| KeypointError::Parse {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            frames.push(Detection::from(record));
        }
        Ok(Self {
            frames: frames.into_iter(),
        })
    }

    /// Frames not yet replayed
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for TraceSource {
    async fn detect(&mut self) -> Result<Option<Detection>, KeypointError> {
        Ok(self.frames.next())
    }
}
