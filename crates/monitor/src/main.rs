use anyhow::{Context, Result};
use cadence_core::{
    run_read_load, stats, BlockMonitor, Config, MockTransport, MonitorReport, PhaseStatistics,
    ReadLoadConfig, ReadLoadReport, ThresholdBand, Transport,
};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "monitor")]
#[command(about = "Measure block cadence, optionally under read-only RPC load")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,

    /// Transport mode: mock or http
    #[arg(long, default_value = "http")]
    mode: String,

    /// How long to monitor, e.g. "60s" (defaults to the baseline duration)
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Issue read-only queries at this rate while monitoring
    #[arg(long)]
    read_rps: Option<u64>,

    /// Block interval of the mock chain in milliseconds
    #[arg(long, default_value = "85")]
    mock_block_ms: u64,
}

#[derive(Debug, Serialize)]
struct MonitorRun {
    timestamp: String,
    transport: String,
    statistics: Option<PhaseStatistics>,
    bands: Vec<ThresholdBand>,
    blocks_observed: u64,
    wall_clock_mean_ms: Option<f64>,
    read_load: Option<ReadLoadReport>,
    monitor: MonitorReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    config.validate()?;

    let transport: Arc<dyn Transport> = match args.mode.as_str() {
        "mock" => Arc::new(MockTransport::new(
            5,
            args.mock_block_ms,
            config.transaction.chain_id,
        )),
        "http" => Arc::new(
            config
                .target
                .http_transport()
                .context("Failed to create HTTP transport")?,
        ),
        _ => anyhow::bail!("Invalid mode: {}, must be 'mock' or 'http'", args.mode),
    };

    let mut monitor_config = config.baseline_monitor();
    if let Some(duration) = args.duration {
        monitor_config.duration = duration;
    }
    let duration = monitor_config.duration;
    let monitor = BlockMonitor::new(transport.clone(), monitor_config, "monitor");

    let (cadence, read_load) = match args.read_rps {
        Some(rps) => {
            info!("Monitoring with {} req/s of read load", rps);
            let read_config = ReadLoadConfig {
                requests_per_sec: rps,
                duration,
                max_in_flight: config.load.max_in_flight,
            };
            let (cadence, read) = tokio::join!(monitor.run(), run_read_load(transport.clone(), read_config));
            (cadence, Some(read.context("Read load failed")?))
        }
        None => (monitor.run().await, None),
    };
    let report = cadence.context("Monitoring failed")?;

    let intervals = report.intervals_ms();
    let run = MonitorRun {
        timestamp: chrono::Utc::now().to_rfc3339(),
        transport: transport.name().to_string(),
        statistics: stats::summarize(&intervals),
        bands: stats::threshold_bands(&intervals, &config.thresholds.bands_ms()),
        blocks_observed: report.blocks_observed(),
        wall_clock_mean_ms: report.wall_clock_mean_ms(),
        read_load,
        monitor: report,
    };

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let output_path = format!("results/monitor_{}.json", timestamp);
    std::fs::create_dir_all("results").ok();
    std::fs::write(&output_path, serde_json::to_string_pretty(&run)?)
        .with_context(|| format!("Failed to write {}", output_path))?;

    info!("Results written to {}", output_path);
    print_summary(&run, config.thresholds.target_interval_ms);

    Ok(())
}

fn print_summary(run: &MonitorRun, target_ms: f64) {
    println!("\n=== Block Cadence ===");
    println!("Transport: {}", run.transport);
    println!("Blocks observed: {}", run.blocks_observed);

    let Some(stats) = &run.statistics else {
        println!("No blocks observed - chain stalled or unreachable");
        println!();
        return;
    };

    if let Some(mean) = run.wall_clock_mean_ms {
        println!("Wall-clock average: {:.1}ms", mean);
    }
    println!("Mean: {:.1}ms", stats.mean);
    if let Some(sd) = stats.stddev {
        println!("Stddev: {:.1}ms", sd);
    }
    println!("Min / Max: {:.1}ms / {:.1}ms", stats.min, stats.max);
    println!(
        "p50 / p90 / p95 / p99: {:.1} / {:.1} / {:.1} / {:.1} ms",
        stats.p50, stats.p90, stats.p95, stats.p99
    );
    for band in &run.bands {
        println!(
            "<= {}ms: {}/{} ({:.1}%)",
            band.limit,
            band.count,
            band.total,
            band.fraction() * 100.0
        );
    }

    if let Some(read) = &run.read_load {
        println!();
        println!("--- Read load ---");
        println!("Requests: {} ({} errors)", read.requests, read.errors);
        println!("Achieved: {:.0} req/s", read.achieved_rps);
    }

    println!();
    if stats.mean <= target_ms {
        println!("Target {}ms met ({:.1}ms)", target_ms, stats.mean);
    } else {
        println!("Target {}ms missed by {:.1}ms", target_ms, stats.mean - target_ms);
    }
    println!();
}
