//! Drowsiness Monitor
//!
//! Drives a DMS session from a landmark source: frame ticks, live
//! configuration, cancellation, and the logging/config plumbing of the
//! `dms-monitor` binary.

pub mod runner;
pub mod settings;
pub mod trace;

pub use runner::{ConfigHandle, FrameLoop, RunSummary, StopHandle};
pub use settings::{LayoutPreset, LoggingSettings, MonitorSettings, ReplaySettings};
pub use trace::TraceSource;

use dms::DmsError;
use keypoints::KeypointError;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error(transparent)]
    Dms(#[from] DmsError),

    #[error("Landmark source failed: {0}")]
    Source(#[from] KeypointError),

    #[error("Failed to set tracing subscriber: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize logging
pub fn init_logging(level: Level, json: bool) -> Result<(), MonitorError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
