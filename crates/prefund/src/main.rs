use anyhow::{Context, Result};
use cadence_core::{AccountStore, Config, JsonFileStore};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

// +20% buffer, integer-only.
const BUFFER_PERCENT: u128 = 20;

#[derive(Parser, Debug)]
#[command(name = "prefund")]
#[command(about = "Prefund estimator for a configured stress run (integer wei math)")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,
}

#[derive(Debug, Serialize, PartialEq)]
struct PrefundReport {
    timestamp: String,
    config_path: String,
    accounts: u128,
    total_tx_count: u128,
    value_wei: u128,
    gas_cost_wei: u128,
    per_tx_wei: u128,
    required_total_wei: u128,
    recommended_total_wei: u128,
    recommended_per_account_wei: u128,
    buffer_percent: u128,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    cfg.validate()?;

    let accounts = match JsonFileStore::new(&cfg.accounts.path).load() {
        Ok(accounts) => accounts.len(),
        Err(e) if e.is_not_found() => {
            warn!(
                "Account file {} missing; estimating for {} generated accounts",
                cfg.accounts.path, cfg.accounts.generate_count
            );
            cfg.accounts.generate_count
        }
        Err(e) => return Err(e).context("Failed to read account file"),
    };
    if accounts == 0 {
        anyhow::bail!("No accounts to fund");
    }

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let report = estimate(&cfg, accounts as u128, timestamp.clone(), &args.config)?;
    info!("Estimated funding for {} transactions", report.total_tx_count);

    println!();
    println!("=== Prefund Report ===");
    println!("Config: {:?}", args.config);
    println!("Total tx count (tps * duration_s): {}", report.total_tx_count);
    println!("Per-tx value (wei): {}", report.value_wei);
    println!("Per-tx gas cost (wei): {}", report.gas_cost_wei);
    println!("Required total (wei): {}", report.required_total_wei);
    println!(
        "Recommended total ({}% buffer) (wei): {}",
        BUFFER_PERCENT, report.recommended_total_wei
    );
    println!(
        "Recommended per account ({} accounts) (wei): {}",
        report.accounts, report.recommended_per_account_wei
    );

    let out_dir = PathBuf::from("results");
    std::fs::create_dir_all(&out_dir).ok();
    let out_path = out_dir.join(format!("prefund_{timestamp}.json"));
    std::fs::write(&out_path, serde_json::to_string_pretty(&report)?)?;
    println!();
    println!("Wrote: {}", out_path.to_string_lossy());
    Ok(())
}

fn estimate(cfg: &Config, accounts: u128, timestamp: String, config_path: &PathBuf) -> Result<PrefundReport> {
    let transfer = cfg.transaction.transfer()?;
    let total_tx = (cfg.load.target_tps as u128)
        .saturating_mul(cfg.load.duration_ms as u128)
        .div_ceil(1000);
    let gas_cost = (transfer.gas_limit as u128).saturating_mul(transfer.gas_price);
    let per_tx = transfer.max_cost();

    let required_total = total_tx.saturating_mul(per_tx);
    let recommended_total = required_total
        .saturating_mul(100 + BUFFER_PERCENT)
        .saturating_div(100);

    Ok(PrefundReport {
        timestamp,
        config_path: config_path.to_string_lossy().to_string(),
        accounts,
        total_tx_count: total_tx,
        value_wei: transfer.value,
        gas_cost_wei: gas_cost,
        per_tx_wei: per_tx,
        required_total_wei: required_total,
        recommended_total_wei: recommended_total,
        recommended_per_account_wei: recommended_total.div_ceil(accounts),
        buffer_percent: BUFFER_PERCENT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[target]
rpc_urls = ["http://localhost:8545"]
timeout_ms = 5000
max_connections = 10

[accounts]
path = "accounts.json"

[load]
target_tps = 100
batch_size = 20
senders_per_batch = 10
duration_ms = 5000

[transaction]
chain_id = 1
value_wei = "1000"
gas_limit = 21000
gas_price_wei = "10"
"#;

    #[test]
    fn test_estimate() {
        let cfg: Config = toml::from_str(EXAMPLE).unwrap();

        let report = estimate(&cfg, 10, "t".into(), &PathBuf::from("c.toml")).unwrap();

        assert_eq!(report.total_tx_count, 500);
        assert_eq!(report.per_tx_wei, 1000 + 210_000);
        assert_eq!(report.required_total_wei, 500 * 211_000);
        assert_eq!(report.recommended_total_wei, 500 * 211_000 * 120 / 100);
        assert_eq!(report.recommended_per_account_wei, 12_660_000);
    }

    #[test]
    fn test_estimate_saturates() {
        let mut cfg: Config = toml::from_str(EXAMPLE).unwrap();
        cfg.transaction.gas_price_wei = u128::MAX.to_string();

        let report = estimate(&cfg, 3, "t".into(), &PathBuf::from("c.toml")).unwrap();

        assert_eq!(report.gas_cost_wei, u128::MAX);
        assert_eq!(report.per_tx_wei, u128::MAX);
        assert_eq!(report.required_total_wei, u128::MAX);
        assert_eq!(report.recommended_per_account_wei, (u128::MAX / 100).div_ceil(3));
    }
}
