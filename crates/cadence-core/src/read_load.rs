//! Read-only RPC pressure: paced bursts of cheap queries, no signing.

use crate::error::BenchError;
use crate::load::permit_budget;
use crate::pacer::BatchPacer;
use crate::stats;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const READ_BURST: u64 = 10;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Methods cycled through by successive requests.
pub fn read_call(i: u64) -> (&'static str, Value) {
    match i % 6 {
        0 => ("eth_blockNumber", json!([])),
        1 => ("eth_gasPrice", json!([])),
        2 => ("net_version", json!([])),
        3 => ("eth_chainId", json!([])),
        4 => ("eth_syncing", json!([])),
        _ => ("eth_getBalance", json!([ZERO_ADDRESS, "latest"])),
    }
}

#[derive(Debug, Clone)]
pub struct ReadLoadConfig {
    pub requests_per_sec: u64,
    pub duration: Duration,
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadLoadReport {
    pub requests: u64,
    pub errors: u64,
    pub elapsed_ms: u64,
    pub achieved_rps: f64,
}

#[derive(Default)]
struct ReadCounters {
    requests: AtomicU64,
    errors: AtomicU64,
}

pub async fn run_read_load(
    transport: Arc<dyn Transport>,
    config: ReadLoadConfig,
) -> Result<ReadLoadReport, BenchError> {
    let max_in_flight = permit_budget(config.max_in_flight)?;
    let pacer = BatchPacer::new(READ_BURST, config.requests_per_sec);
    let semaphore = Arc::new(Semaphore::new(max_in_flight as usize));
    let counters = Arc::new(ReadCounters::default());

    info!(
        "Read load: {} req/s for {:?} in bursts of {}",
        config.requests_per_sec, config.duration, READ_BURST
    );

    let start = Instant::now();
    let mut issued = 0u64;
    'dispatch: while start.elapsed() < config.duration {
        let tick = Instant::now();
        for _ in 0..READ_BURST {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Read dispatch stopped: {}", e);
                    break 'dispatch;
                }
            };
            if start.elapsed() >= config.duration {
                break 'dispatch;
            }
            let (method, params) = read_call(issued);
            issued += 1;
            let transport = transport.clone();
            let counters = counters.clone();
            tokio::spawn(async move {
                counters.requests.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = transport.query(method, params).await {
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                    debug!("Read {} failed: {}", method, e);
                }
                drop(permit);
            });
        }
        pacer.pace(tick).await;
    }

    if let Err(e) = semaphore.acquire_many(max_in_flight).await {
        warn!("Read drain interrupted, counters may be incomplete: {}", e);
    }
    let elapsed = start.elapsed();
    let requests = counters.requests.load(Ordering::Relaxed);
    let errors = counters.errors.load(Ordering::Relaxed);

    let report = ReadLoadReport {
        requests,
        errors,
        elapsed_ms: elapsed.as_millis() as u64,
        achieved_rps: stats::throughput(requests, config.duration),
    };
    info!(
        "Read load complete: {} requests, {} errors, {:.0} req/s",
        report.requests, report.errors, report.achieved_rps
    );
    Ok(report)
}
