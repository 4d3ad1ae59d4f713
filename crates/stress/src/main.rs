use anyhow::{Context, Result};
use cadence_core::{
    chain, load_or_generate, AccountPool, Config, JsonFileStore, LocalKeySigner, MockTransport,
    Orchestrator, PhaseResult, PhaseStatus, RunReport, Transport,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stress")]
#[command(about = "Block-cadence stress test - baseline, sustained load, verdict")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,

    /// Transport mode: mock or http
    #[arg(long, default_value = "http")]
    mode: String,

    /// Target transactions per second (overrides config)
    #[arg(long)]
    tps: Option<u64>,

    /// Load duration, e.g. "30s" (overrides config; extends the loaded monitor to match)
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Account file (overrides config)
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// Block interval of the mock chain in milliseconds
    #[arg(long, default_value = "85")]
    mock_block_ms: u64,
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

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let store = JsonFileStore::new(&config.accounts.path);
    let records = load_or_generate(&store, config.accounts.generate_count, &mut rand::thread_rng())
        .with_context(|| format!("Failed to load accounts from {}", config.accounts.path))?;
    let pool = Arc::new(AccountPool::from_records(&records));
    let signer = Arc::new(LocalKeySigner::from_records(&records));

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

    info!(
        "Starting stress run in {} mode: {} tx/s for {}ms over {} accounts",
        transport.name(),
        config.load.target_tps,
        config.load.duration_ms,
        pool.len()
    );

    match chain::chain_id(transport.as_ref()).await {
        Ok(id) if id != config.transaction.chain_id => warn!(
            "Endpoint reports chain id {} but transactions are signed for {}",
            id, config.transaction.chain_id
        ),
        Ok(_) => {}
        Err(e) => warn!("Could not read chain id: {}", e),
    }

    let mut orchestrator = Orchestrator::from_config(&config, pool, signer, transport)?;
    let report = orchestrator.run().await;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let output_path = format!("results/run_{}.json", timestamp);

    std::fs::create_dir_all("results").ok();
    let report_json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&output_path, report_json)
        .with_context(|| format!("Failed to write {}", output_path))?;

    info!("Results written to {}", output_path);
    print_summary(&report);

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(tps) = args.tps {
        config.load.target_tps = tps;
    }
    if let Some(path) = &args.accounts {
        config.accounts.path = path.to_string_lossy().to_string();
    }
    if let Some(duration) = args.duration {
        let ms = duration.as_millis() as u64;
        config.load.duration_ms = ms;
        config.monitor.loaded_duration_ms = config.monitor.loaded_duration_ms.max(ms);
    }
}

fn print_phase(title: &str, phase: &PhaseResult) {
    println!("--- {} ---", title);
    if let PhaseStatus::Failed(reason) = &phase.status {
        println!("FAILED: {}", reason);
        return;
    }
    let Some(stats) = &phase.statistics else {
        println!("No blocks observed");
        return;
    };
    println!("Blocks observed: {}", phase.blocks_observed);
    if let Some(mean) = phase.wall_clock_mean_ms {
        println!("Wall-clock average: {:.1}ms", mean);
    }
    println!("Samples: {}", stats.count);
    match stats.stddev {
        Some(sd) => println!("Mean: {:.1}ms (stddev {:.1}ms)", stats.mean, sd),
        None => println!("Mean: {:.1}ms", stats.mean),
    }
    println!("Min / Max: {:.1}ms / {:.1}ms", stats.min, stats.max);
    println!(
        "p50 / p90 / p95 / p99: {:.1} / {:.1} / {:.1} / {:.1} ms",
        stats.p50, stats.p90, stats.p95, stats.p99
    );
    for band in &phase.bands {
        println!(
            "<= {}ms: {}/{} ({:.1}%)",
            band.limit,
            band.count,
            band.total,
            band.fraction() * 100.0
        );
    }
}

fn print_summary(report: &RunReport) {
    println!("\n=== Block Cadence Stress Test ===");
    println!("Started: {}", report.started_at);
    println!("Transport: {}", report.transport);
    println!("Accounts: {}", report.accounts);
    println!();
    print_phase("Baseline", &report.baseline);
    println!();
    print_phase("Under load", &report.loaded);

    if let Some(load) = &report.load {
        println!();
        println!("--- Load ---");
        println!("Target: {} tx/s for {}ms", load.target_tps, load.duration_ms);
        println!(
            "Achieved: {:.0} tx/s ({:.1}% of target)",
            load.achieved_tps, load.achievement_pct
        );
        println!("Sent: {}", load.sent);
        println!(
            "Failed: {} (rejected {}, transport {}, signing {})",
            load.failed, load.rejected, load.transport_errors, load.signing_errors
        );
        println!("Batches: {} ({} overran)", load.batches, load.overruns);
        if let Some(latency) = &load.submit_latency {
            println!(
                "Submit latency p50 / p95 / p99: {:.1} / {:.1} / {:.1} ms",
                latency.p50, latency.p95, latency.p99
            );
        }
    }

    if let Some(shift) = report.cadence_shift_ms {
        println!();
        println!("Cadence shift under load: {:+.1}ms", shift);
    }

    println!();
    println!("=== Verdict: {} ===", report.verdict.tier);
    println!("{}", report.verdict.reason);
    println!();
}
