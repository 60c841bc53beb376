//! Frame-driven monitoring loop
//!
//! One evaluation per frame tick, strictly in order. While detection for a
//! frame is still pending, ticks that fall due are dropped rather than
//! queued. Configuration is read from a watch channel at every evaluation,
//! so settings edits apply from the next frame on.

use std::time::Duration;

use dms::{DmsAnalysis, DmsConfig, DmsError, DmsSession, SessionStats};
use keypoints::{LandmarkLayout, LandmarkSource};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::MonitorError;

/// Writer side of the live configuration
///
/// Updates are validated before they reach the loop; a rejected update
/// leaves the previous configuration in force.
pub struct ConfigHandle {
    tx: watch::Sender<DmsConfig>,
}

impl ConfigHandle {
    /// Create a handle and the receiver to give to a `FrameLoop`
    pub fn new(initial: DmsConfig) -> Result<(Self, watch::Receiver<DmsConfig>), DmsError> {
        initial.validate()?;
        let (tx, rx) = watch::channel(initial);
        Ok((Self { tx }, rx))
    }

    /// Replace the configuration
    pub fn update(&self, config: DmsConfig) -> Result<(), DmsError> {
        config.validate()?;
        info!(?config, "DMS configuration updated");
        self.tx.send_replace(config);
        Ok(())
    }

    /// Edit a copy of the current configuration and apply it
    pub fn modify(&self, edit: impl FnOnce(&mut DmsConfig)) -> Result<(), DmsError> {
        let mut next = self.current();
        edit(&mut next);
        self.update(next)
    }

    pub fn current(&self) -> DmsConfig {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DmsConfig> {
        self.tx.subscribe()
    }
}

/// Ends a running `FrameLoop`
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Stop monitoring; a detection still in flight is discarded
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Outcome of a monitoring run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub stats: SessionStats,
    /// Ticks dropped because detection was still pending
    pub ticks_skipped: u64,
    /// Whether the run ended through `StopHandle::stop`
    pub stopped: bool,
}

/// Monitoring loop for one session
pub struct FrameLoop {
    period: Duration,
    layout: LandmarkLayout,
    config: watch::Receiver<DmsConfig>,
    stop: watch::Receiver<bool>,
}

impl FrameLoop {
    /// Create a loop ticking `fps` times per second (at least once)
    pub fn new(
        fps: u32,
        layout: LandmarkLayout,
        config: watch::Receiver<DmsConfig>,
    ) -> (Self, StopHandle) {
        let (tx, stop) = watch::channel(false);
        // Sub-microsecond periods would truncate to zero
        let period = Duration::from_micros(1_000_000 / u64::from(fps.clamp(1, 1_000_000)));
        let frame_loop = Self {
            period,
            layout,
            config,
            stop,
        };
        (frame_loop, StopHandle { tx })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run until the source is exhausted or the loop is stopped.
    ///
    /// Every analysis is handed to `observer`. The session state is dropped
    /// when this returns.
    pub async fn run<S, F>(mut self, source: &mut S, mut observer: F) -> Result<RunSummary, MonitorError>
    where
        S: LandmarkSource,
        F: FnMut(&DmsAnalysis),
    {
        let mut session = DmsSession::new(self.layout);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = RunSummary::default();

        info!(period_ms = self.period.as_secs_f64() * 1000.0, "Monitoring started");

        loop {
            let tick_at = tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => {
                    summary.stopped = true;
                    break;
                }
                tick_at = ticker.tick() => tick_at,
            };

            let detection = tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => {
                    debug!("Stopped while detection was pending; frame discarded");
                    summary.stopped = true;
                    break;
                }
                detection = source.detect() => detection?,
            };
            let Some(detection) = detection else {
                info!("Landmark source exhausted");
                break;
            };

            let config = self.config.borrow_and_update().clone();
            let analysis = session.process(&detection, &config);
            observer(&analysis);

            summary.ticks_skipped += self.skip_overrun(&mut ticker, tick_at);
        }

        summary.stats = session.stats();
        info!(
            frames = summary.stats.frames_processed,
            skipped = summary.ticks_skipped,
            stopped = summary.stopped,
            "Monitoring finished"
        );
        Ok(summary)
    }

    /// Drop every tick that fell due while the frame started at `tick_at`
    /// was being processed; returns how many were dropped
    fn skip_overrun(&self, ticker: &mut tokio::time::Interval, tick_at: Instant) -> u64 {
        let elapsed = tick_at.elapsed();
        if elapsed < self.period {
            return 0;
        }
        let missed = u32::try_from(elapsed.as_nanos() / self.period.as_nanos()).unwrap_or(u32::MAX);
        debug!(missed, elapsed_ms = elapsed.as_millis() as u64, "Detection overran frame budget");
        let next = tick_at
            .checked_add(self.period.saturating_mul(missed.saturating_add(1)))
            .unwrap_or_else(|| Instant::now() + self.period);
        ticker.reset_at(next);
        u64::from(missed)
    }
}

/// Resolves once stop has been requested; never resolves if the stop
/// handle is gone without stopping
async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
