//! Block-cadence sampling.
//!
//! Height is polled far faster than blocks are produced and elapsed time is
//! taken from the local monotonic clock. Chain header timestamps are never
//! used: they commonly have one-second resolution, an order of magnitude
//! coarser than the cadence being measured.
//!
//! Interval smoothing: when a poll observes the height advance by Δ blocks,
//! the time since the previous detection is split evenly into Δ samples.
//! This is an approximation; the individual block times inside one poll gap
//! are not recoverable from height alone.

use crate::chain;
use crate::error::BenchError;
use crate::stats;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// One observed inter-block duration, closing block `height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalSample {
    pub interval_ms: f64,
    pub height: u64,
}

/// Turns a stream of (height, instant) observations into interval samples.
#[derive(Debug, Clone)]
pub struct CadenceTracker {
    last_height: u64,
    last_at: Instant,
    window: VecDeque<f64>,
    window_size: usize,
}

impl CadenceTracker {
    pub fn new(height: u64, at: Instant, window_size: usize) -> Self {
        Self {
            last_height: height,
            last_at: at,
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Record a poll result. Returns one sample per newly produced block,
    /// each carrying an equal share of the time since the last detection.
    /// Unchanged or lower heights produce nothing.
    pub fn observe(&mut self, height: u64, at: Instant) -> Vec<IntervalSample> {
        if height <= self.last_height {
            return Vec::new();
        }
        let delta = height - self.last_height;
        let elapsed_ms = at.duration_since(self.last_at).as_secs_f64() * 1000.0;
        let interval_ms = elapsed_ms / delta as f64;

        let samples: Vec<IntervalSample> = (self.last_height + 1..=height)
            .map(|h| IntervalSample {
                interval_ms,
                height: h,
            })
            .collect();

        for _ in 0..delta.min(self.window_size as u64) {
            if self.window.len() == self.window_size {
                self.window.pop_front();
            }
            self.window.push_back(interval_ms);
        }

        self.last_height = height;
        self.last_at = at;
        samples
    }

    pub fn last_height(&self) -> u64 {
        self.last_height
    }

    /// Mean over the rolling window used for live progress.
    pub fn rolling_mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub duration: Duration,
    pub rolling_window: usize,
    /// Attempts to read the starting height before the phase is abandoned.
    pub startup_attempts: u32,
    /// Log a progress line every this many blocks.
    pub progress_every_blocks: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            duration: Duration::from_secs(30),
            rolling_window: 10,
            startup_attempts: 3,
            progress_every_blocks: 10,
        }
    }
}

/// Everything one monitoring run observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub samples: Vec<IntervalSample>,
    pub start_height: u64,
    pub end_height: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub elapsed_ms: f64,
}

impl MonitorReport {
    pub fn blocks_observed(&self) -> u64 {
        self.end_height - self.start_height
    }

    /// Interval values in observation order.
    pub fn intervals_ms(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.interval_ms).collect()
    }

    /// Whole-run average: elapsed time over blocks observed.
    pub fn wall_clock_mean_ms(&self) -> Option<f64> {
        match self.blocks_observed() {
            0 => None,
            blocks => Some(self.elapsed_ms / blocks as f64),
        }
    }
}

/// Polls chain height for a fixed wall-clock duration.
pub struct BlockMonitor {
    transport: Arc<dyn Transport>,
    config: MonitorConfig,
    label: String,
}

impl BlockMonitor {
    pub fn new(transport: Arc<dyn Transport>, config: MonitorConfig, label: impl Into<String>) -> Self {
        Self {
            transport,
            config,
            label: label.into(),
        }
    }

    /// Run until the deadline. Only a failure to read the starting height is
    /// an error; later poll failures are counted and retried on the next tick.
    pub async fn run(&self) -> Result<MonitorReport, BenchError> {
        let start = Instant::now();
        let start_height = self.starting_height().await?;

        info!(
            "[{}] Monitoring block production for {:?} from height {}",
            self.label, self.config.duration, start_height
        );

        let mut tracker = CadenceTracker::new(start_height, Instant::now(), self.config.rolling_window);
        let mut samples = Vec::new();
        let mut polls = 0u64;
        let mut poll_errors = 0u64;
        let every = self.config.progress_every_blocks.max(1);

        while start.elapsed() < self.config.duration {
            sleep(self.config.poll_interval).await;
            polls += 1;

            let height = match chain::block_number(self.transport.as_ref()).await {
                Ok(h) => h,
                Err(e) => {
                    poll_errors += 1;
                    debug!("[{}] Poll failed: {}", self.label, e);
                    continue;
                }
            };

            let before = tracker.last_height() - start_height;
            let new_samples = tracker.observe(height, Instant::now());
            let Some(last) = new_samples.last().copied() else {
                continue;
            };
            samples.extend(new_samples);

            let after = tracker.last_height() - start_height;
            if after / every > before / every {
                info!(
                    "[{}] Block {}: {:.1}ms (avg last {}: {:.1}ms)",
                    self.label,
                    last.height,
                    last.interval_ms,
                    self.config.rolling_window,
                    tracker.rolling_mean().unwrap_or(last.interval_ms)
                );
            }
        }

        let report = MonitorReport {
            samples,
            start_height,
            end_height: tracker.last_height(),
            polls,
            poll_errors,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        match report.wall_clock_mean_ms() {
            Some(mean) => info!(
                "[{}] Monitoring complete: {} blocks in {:.1}s (average {:.1}ms)",
                self.label,
                report.blocks_observed(),
                report.elapsed_ms / 1000.0,
                mean
            ),
            None => warn!(
                "[{}] Monitoring complete: no new blocks in {:.1}s",
                self.label,
                report.elapsed_ms / 1000.0
            ),
        }
        if report.poll_errors > 0 {
            warn!(
                "[{}] {} of {} polls failed",
                self.label, report.poll_errors, report.polls
            );
        }
        if let Some(window_mean) = stats::trailing_mean(&report.intervals_ms(), self.config.rolling_window) {
            debug!("[{}] Final rolling mean {:.1}ms", self.label, window_mean);
        }

        Ok(report)
    }

    async fn starting_height(&self) -> Result<u64, BenchError> {
        let attempts = self.config.startup_attempts.max(1);
        let mut attempt = 1;
        loop {
            match chain::block_number(self.transport.as_ref()).await {
                Ok(height) => return Ok(height),
                Err(e) if attempt < attempts => {
                    warn!(
                        "[{}] Cannot read starting height (attempt {}/{}): {}",
                        self.label, attempt, attempts, e
                    );
                    attempt += 1;
                    sleep(self.config.poll_interval).await;
                }
                Err(source) => {
                    return Err(BenchError::EndpointUnreachable { attempts, source });
                }
            }
        }
    }
}
