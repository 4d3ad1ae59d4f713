use anyhow::{Context, Result};
use cadence_core::{chain, AccountStore, Config, HttpJsonRpcTransport, JsonFileStore, Transport};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

const WEI_PER_ETH: f64 = 1e18;

#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(about = "Preflight checks before a stress run (RPC health, chain id, accounts, timestamps)")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,

    /// Number of accounts to inspect
    #[arg(long, default_value = "3")]
    sample_accounts: usize,

    /// Number of recent blocks to inspect for timestamp resolution
    #[arg(long, default_value = "5")]
    sample_blocks: u64,
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
    let cfg = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    info!("Validating config RPC URLs...");
    let mut base_urls = Vec::new();
    for u in &cfg.target.rpc_urls {
        let url = validate_rpc_url(u).with_context(|| format!("Invalid target.rpc_urls entry: {u}"))?;
        base_urls.push(url);
    }

    println!();
    println!("=== Preflight ({} endpoints) ===", base_urls.len());

    let mut failures = 0u64;
    for url in &base_urls {
        println!();
        println!("Endpoint: {url}");
        let transport = HttpJsonRpcTransport::new(vec![url.to_string()], cfg.target.timeout_ms, 4)
            .context("Failed to build HTTP transport")?;
        if !check_endpoint(&transport, cfg.transaction.chain_id).await {
            failures = failures.saturating_add(1);
        }
    }

    let transport = cfg.target.http_transport().context("Failed to build HTTP transport")?;

    println!();
    println!("--- Accounts ({}) ---", cfg.accounts.path);
    check_accounts(&transport, &cfg, args.sample_accounts).await;

    println!();
    println!("--- Block timestamps ---");
    check_timestamp_resolution(&transport, args.sample_blocks).await;

    if failures > 0 {
        anyhow::bail!("Preflight failed: {failures} endpoint(s) unhealthy");
    }

    println!();
    println!("Preflight OK.");
    Ok(())
}

fn validate_rpc_url(raw: &str) -> Result<url::Url> {
    let url = url::Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("RPC URL must be http:// or https:// (got {raw})");
    }
    if !url.username().is_empty() || url.password().is_some() {
        anyhow::bail!("RPC URL must not include credentials (got {raw})");
    }
    url.host_str().context("RPC URL must include a hostname")?;
    if url.query().is_some() || url.fragment().is_some() {
        anyhow::bail!("RPC URL must not include query/fragment (got {raw})");
    }

    Ok(url)
}

/// Connectivity, latest block and chain id. `false` on any required failure.
async fn check_endpoint(transport: &dyn Transport, expected_chain_id: u64) -> bool {
    let start = Instant::now();
    let height = chain::block_number(transport).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match height {
        Ok(h) => println!("eth_blockNumber -> {} ({}ms)", h, latency_ms),
        Err(e) => {
            println!("eth_blockNumber -> ERROR ({}ms)", latency_ms);
            warn!("Endpoint unreachable: {}", e);
            return false;
        }
    }

    match chain::chain_id(transport).await {
        Ok(id) if id == expected_chain_id => println!("eth_chainId     -> {}", id),
        Ok(id) => {
            println!("eth_chainId     -> {} (config expects {})", id, expected_chain_id);
            warn!("Chain id mismatch: signed transactions would be rejected");
            return false;
        }
        Err(e) => {
            println!("eth_chainId     -> ERROR");
            warn!("Chain id query failed: {}", e);
            return false;
        }
    }

    // Best-effort: a syncing node still answers, but its cadence is not representative.
    match chain::is_syncing(transport).await {
        Ok(false) => println!("eth_syncing     -> false"),
        Ok(true) => warn!("Node reports syncing; measured cadence may not be representative"),
        Err(e) => warn!("eth_syncing failed (best-effort): {}", e),
    }
    true
}

async fn check_accounts(transport: &dyn Transport, cfg: &Config, sample: usize) {
    let accounts = match JsonFileStore::new(&cfg.accounts.path).load() {
        Ok(accounts) => accounts,
        Err(e) if e.is_not_found() => {
            warn!(
                "Account file missing; stress would generate {} unfunded accounts",
                cfg.accounts.generate_count
            );
            return;
        }
        Err(e) => {
            warn!("Cannot read account file: {}", e);
            return;
        }
    };
    println!("Accounts loaded: {}", accounts.len());

    let senders = cfg.load.senders_per_batch;
    if accounts.len() < senders {
        warn!(
            "Only {} accounts for {} senders per batch; batches will use fewer senders",
            accounts.len(),
            senders
        );
    }

    for account in accounts.iter().take(sample) {
        let balance = chain::balance(transport, &account.address).await;
        let nonce = chain::pending_nonce(transport, &account.address).await;
        match (balance, nonce) {
            (Ok(balance), Ok(nonce)) => {
                println!(
                    "{}: {:.4} ETH, pending nonce {}",
                    account.address,
                    balance as f64 / WEI_PER_ETH,
                    nonce
                );
                if balance == 0 {
                    warn!("{} has no balance; its transfers will be rejected", account.address);
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                println!("{}: ERROR", account.address);
                warn!("Account query failed: {}", e);
            }
        }
    }
}

/// Header timestamps of the most recent blocks. Several blocks sharing one
/// second shows why cadence is measured with a local clock instead.
async fn check_timestamp_resolution(transport: &dyn Transport, sample: u64) {
    let latest = match chain::block_number(transport).await {
        Ok(h) => h,
        Err(e) => {
            warn!("Cannot read latest block: {}", e);
            return;
        }
    };

    let mut timestamps = BTreeSet::new();
    let mut previous: Option<u64> = None;
    let first = latest.saturating_sub(sample.saturating_sub(1));
    for number in first..=latest {
        match chain::block_header(transport, Some(number)).await {
            Ok(header) => {
                let diff = previous
                    .map(|p| format!(" (+{}s)", header.timestamp.saturating_sub(p)))
                    .unwrap_or_default();
                println!("Block {}: timestamp {}{}", header.number, header.timestamp, diff);
                timestamps.insert(header.timestamp);
                previous = Some(header.timestamp);
            }
            Err(e) => warn!("Cannot read block {}: {}", number, e),
        }
    }

    let blocks = latest - first + 1;
    if (timestamps.len() as u64) < blocks {
        println!(
            "{} blocks share {} distinct timestamps: header time is too coarse for sub-second cadence",
            blocks,
            timestamps.len()
        );
    }
}
