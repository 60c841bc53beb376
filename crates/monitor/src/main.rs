//! Drowsiness Monitor - Main Entry Point

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use dms::{DmsAnalysis, DmsEvent};
use monitor::{init_logging, ConfigHandle, FrameLoop, MonitorSettings, TraceSource};
use tracing::{debug, info, warn, Level};

/// Replay a landmark trace through the drowsiness estimator
#[derive(Parser, Debug)]
#[command(name = "dms-monitor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Landmark trace (JSON lines)
    #[arg(short, long)]
    trace: PathBuf,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings =
        MonitorSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(fps) = cli.fps {
        settings.replay.fps = fps;
        settings.validate()?;
    }

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        settings.logging.max_level()?
    };
    init_logging(level, cli.json_logs || settings.logging.json)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let mut source = TraceSource::open(&cli.trace)
        .with_context(|| format!("Failed to open trace {}", cli.trace.display()))?;

    let (config_handle, config_rx) = ConfigHandle::new(settings.detection.clone())?;
    let (frame_loop, stop) = FrameLoop::new(settings.replay.fps, settings.replay.layout.layout(), config_rx);

    let run = frame_loop.run(&mut source, report);
    tokio::pin!(run);
    let mut reload = ReloadSignal::new()?;

    let summary = loop {
        tokio::select! {
            summary = &mut run => break summary?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                stop.stop();
            }
            _ = reload.recv() => reload_detection(&config_handle, cli.config.as_deref()),
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Presentation side of the loop: log what the caller would act on
fn report(analysis: &DmsAnalysis) {
    for event in &analysis.events {
        match event {
            DmsEvent::AlertRaised { timestamp_ms, closed_ms } => {
                warn!(timestamp_ms, closed_ms, "DROWSINESS ALERT");
            }
            DmsEvent::AlertCleared { timestamp_ms, score } => {
                info!(timestamp_ms, score, "Drowsiness alert cleared");
            }
            DmsEvent::FaceLost { timestamp_ms, absent_frames } => {
                warn!(timestamp_ms, absent_frames, "Face not visible");
            }
            DmsEvent::Blink { .. } | DmsEvent::Yawn { .. } => debug!(?event, "Event"),
        }
    }
    debug!(
        score = analysis.drowsiness_score,
        level = ?analysis.drowsiness_level,
        perclos = analysis.perclos,
        "Frame"
    );
}

/// Re-read detection settings; an invalid file keeps the running config
fn reload_detection(handle: &ConfigHandle, path: Option<&Path>) {
    match MonitorSettings::load(path) {
        Ok(settings) => {
            if let Err(e) = handle.update(settings.detection) {
                warn!("Rejected reloaded settings: {}", e);
            }
        }
        Err(e) => warn!("Failed to reload settings: {}", e),
    }
}

/// SIGHUP on unix; never fires elsewhere
struct ReloadSignal {
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ReloadSignal {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            hangup: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if self.hangup.recv().await.is_some() {
            return;
        }
        std::future::pending::<()>().await
    }
}
