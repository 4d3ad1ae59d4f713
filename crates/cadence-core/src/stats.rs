use crate::transport::SubmissionOutcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Percentile cuts reported for every phase.
pub const REPORTED_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

/// Summary of one phase's samples. Built once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStatistics {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent below two samples.
    pub stddev: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Reduce `samples` to statistics. `None` means "no data".
///
/// Works on a sorted copy; the caller's ordering is left untouched.
pub fn summarize(samples: &[f64]) -> Option<PhaseStatistics> {
    if samples.is_empty() {
        return None;
    }

    let count = samples.len();
    let mean = samples.iter().sum::<f64>() / count as f64;
    let stddev = if count >= 2 {
        let sum_sq: f64 = samples.iter().map(|s| (s - mean) * (s - mean)).sum();
        Some((sum_sq / (count - 1) as f64).sqrt())
    } else {
        None
    };

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(PhaseStatistics {
        count,
        mean,
        stddev,
        min: sorted[0],
        max: sorted[count - 1],
        p50: percentile(&sorted, REPORTED_PERCENTILES[0]),
        p90: percentile(&sorted, REPORTED_PERCENTILES[1]),
        p95: percentile(&sorted, REPORTED_PERCENTILES[2]),
        p99: percentile(&sorted, REPORTED_PERCENTILES[3]),
    })
}

/// Nearest-rank percentile of an ascending slice: index `floor(p/100 * N)`
/// clamped to `[0, N-1]`. Returns NaN for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (p / 100.0 * sorted.len() as f64).floor();
    let idx = if rank.is_sign_negative() {
        0
    } else {
        (rank as usize).min(sorted.len() - 1)
    };
    sorted[idx]
}

/// Number of samples `<= limit`.
pub fn count_at_or_below(samples: &[f64], limit: f64) -> usize {
    samples.iter().filter(|&&s| s <= limit).count()
}

/// How many samples fell at or under one limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub limit: f64,
    pub count: usize,
    pub total: usize,
}

impl ThresholdBand {
    /// Share of samples inside the band, 0.0 for an empty phase.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count as f64 / self.total as f64
        }
    }
}

pub fn threshold_bands(samples: &[f64], limits: &[f64]) -> Vec<ThresholdBand> {
    limits
        .iter()
        .map(|&limit| ThresholdBand {
            limit,
            count: count_at_or_below(samples, limit),
            total: samples.len(),
        })
        .collect()
}

/// Mean of the last `window` samples, or of all of them if fewer.
pub fn trailing_mean(samples: &[f64], window: usize) -> Option<f64> {
    if samples.is_empty() || window == 0 {
        return None;
    }
    let tail = &samples[samples.len().saturating_sub(window)..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Events per second over `elapsed`; zero for a zero-length window.
pub fn throughput(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Running submission counters. Owned by exactly one task at a time.
#[derive(Debug, Clone, Default)]
pub struct OutcomeCounters {
    pub attempted: u64,
    pub sent: u64,
    pub failed: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub signing_errors: u64,
    latencies_ms: Vec<f64>,
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &SubmissionOutcome, latency: Duration) {
        self.attempted += 1;
        match outcome {
            SubmissionOutcome::Accepted => self.sent += 1,
            SubmissionOutcome::Rejected(_) => {
                self.failed += 1;
                self.rejected += 1;
            }
            SubmissionOutcome::TransportError(_) => {
                self.failed += 1;
                self.transport_errors += 1;
            }
        }
        self.latencies_ms.push(latency.as_micros() as f64 / 1000.0);
    }

    /// A transaction that never reached the transport because signing failed.
    pub fn record_signing_error(&mut self) {
        self.attempted += 1;
        self.failed += 1;
        self.signing_errors += 1;
    }

    pub fn latencies_ms(&self) -> &[f64] {
        &self.latencies_ms
    }
}
