use std::time::Duration;
use tokio::time::{sleep, Instant};

const MICROS_PER_SECOND: u128 = 1_000_000;

/// Closed-loop batch pacing: converts a target rate into a fixed interval
/// between batches and sleeps off whatever part of the interval a batch did
/// not use. A batch that overruns is followed immediately, with no catch-up.
#[derive(Debug, Clone, Copy)]
pub struct BatchPacer {
    batch_size: u64,
    interval: Duration,
}

impl BatchPacer {
    /// Interval = `batch_size / rate_per_sec`, computed in integer microseconds.
    pub fn new(batch_size: u64, rate_per_sec: u64) -> Self {
        let rate = rate_per_sec.max(1) as u128;
        let interval_micros = (batch_size as u128) * MICROS_PER_SECOND / rate;
        Self {
            batch_size,
            interval: Duration::from_micros(interval_micros as u64),
        }
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until `tick_start + interval`. Returns `true` if the batch had
    /// already overrun its slot.
    pub async fn pace(&self, tick_start: Instant) -> bool {
        let spent = tick_start.elapsed();
        if spent >= self.interval {
            return true;
        }
        sleep(self.interval - spent).await;
        false
    }
}
