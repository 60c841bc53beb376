//! Layered monitor settings
//!
//! Defaults, then an optional TOML file, then `DMS_*` environment variables
//! (`DMS_DETECTION__EAR_THRESHOLD=0.2`).

use std::path::Path;

use dms::DmsConfig;
use keypoints::LandmarkLayout;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::MonitorError;

/// Highest accepted frame rate
pub const MAX_FPS: u32 = 1000;

/// `DMS_` prefix, `__` between nested keys
fn environment() -> config::Environment {
    config::Environment::with_prefix("DMS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Drowsiness thresholds
    pub detection: DmsConfig,
    /// Frame scheduling
    pub replay: ReplaySettings,
    pub logging: LoggingSettings,
}

/// Landmark index layout of the detector feeding the monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPreset {
    #[default]
    Face68,
    Face68OuterLips,
}

impl LayoutPreset {
    pub fn layout(&self) -> LandmarkLayout {
        match self {
            LayoutPreset::Face68 => LandmarkLayout::face68(),
            LayoutPreset::Face68OuterLips => LandmarkLayout::face68_outer_lips(),
        }
    }
}

/// Frame scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Frame ticks per second
    pub fps: u32,
    pub layout: LayoutPreset,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            fps: 30,
            layout: LayoutPreset::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    pub fn max_level(&self) -> Result<Level, MonitorError> {
        self.level
            .parse()
            .map_err(|_| MonitorError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

impl MonitorSettings {
    /// Load settings from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self, MonitorError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings: Self = builder.add_source(env).build()?.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.detection.validate()?;
        if !(1..=MAX_FPS).contains(&self.replay.fps) {
            return Err(MonitorError::Invalid(format!(
                "replay.fps must be between 1 and {MAX_FPS}, got {}",
                self.replay.fps
            )));
        }
        self.logging.max_level()?;
        Ok(())
    }
}
