use crate::error::BenchError;
use crate::load::{LoadConfig, TransferTemplate};
use crate::monitor::MonitorConfig;
use crate::transport::HttpJsonRpcTransport;
use crate::verdict::VerdictThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub accounts: AccountsConfig,
    pub load: LoadSection,
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject combinations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), BenchError> {
        let invalid = |msg: String| Err(BenchError::Configuration(msg));

        if self.target.rpc_urls.is_empty() {
            return invalid("target.rpc_urls is empty".into());
        }
        for url in &self.target.rpc_urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return invalid(format!("rpc url {url} must be http:// or https://"));
            }
        }
        if self.target.max_connections == 0 {
            return invalid("target.max_connections must be positive".into());
        }

        let load = &self.load;
        if load.target_tps == 0 || load.batch_size == 0 || load.duration_ms == 0 {
            return invalid("load.target_tps, load.batch_size and load.duration_ms must be positive".into());
        }
        if load.senders_per_batch == 0 {
            return invalid("load.senders_per_batch must be positive".into());
        }
        if load.senders_per_batch as u64 > load.batch_size {
            return invalid(format!(
                "load.senders_per_batch ({}) exceeds load.batch_size ({})",
                load.senders_per_batch, load.batch_size
            ));
        }
        if load.max_in_flight == 0 {
            return invalid("load.max_in_flight must be positive".into());
        }

        let monitor = &self.monitor;
        if monitor.poll_interval_ms == 0 || monitor.rolling_window == 0 {
            return invalid("monitor.poll_interval_ms and monitor.rolling_window must be positive".into());
        }
        if monitor.loaded_duration_ms < load.duration_ms {
            return invalid(format!(
                "monitor.loaded_duration_ms ({}) is shorter than load.duration_ms ({})",
                monitor.loaded_duration_ms, load.duration_ms
            ));
        }

        let t = &self.thresholds;
        if t.acceptable_interval_ms < t.target_interval_ms {
            return invalid("thresholds.acceptable_interval_ms is below target_interval_ms".into());
        }
        if t.min_throughput > t.target_throughput {
            return invalid("thresholds.min_throughput exceeds target_throughput".into());
        }
        if monitor.poll_interval_ms.saturating_mul(4) as f64 > t.target_interval_ms {
            return invalid(format!(
                "monitor.poll_interval_ms ({}) must be at least 4x faster than the {}ms target",
                monitor.poll_interval_ms, t.target_interval_ms
            ));
        }

        self.transaction.transfer()?;
        Ok(())
    }

    pub fn load_config(&self) -> Result<LoadConfig, BenchError> {
        Ok(LoadConfig {
            target_tps: self.load.target_tps,
            batch_size: self.load.batch_size,
            senders_per_batch: self.load.senders_per_batch,
            duration: Duration::from_millis(self.load.duration_ms),
            max_in_flight: self.load.max_in_flight,
            progress_every: Duration::from_millis(self.load.progress_every_ms),
            seed: self.load.seed,
            transfer: self.transaction.transfer()?,
        })
    }

    pub fn baseline_monitor(&self) -> MonitorConfig {
        self.monitor.to_monitor_config(self.monitor.baseline_duration_ms)
    }

    pub fn loaded_monitor(&self) -> MonitorConfig {
        self.monitor.to_monitor_config(self.monitor.loaded_duration_ms)
    }

    pub fn verdict_thresholds(&self) -> VerdictThresholds {
        VerdictThresholds {
            target_interval_ms: self.thresholds.target_interval_ms,
            acceptable_interval_ms: self.thresholds.acceptable_interval_ms,
            min_throughput: self.thresholds.min_throughput,
            target_throughput: self.thresholds.target_throughput,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// RPC endpoints, used round-robin
    pub rpc_urls: Vec<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum concurrent requests across the whole harness
    pub max_connections: usize,
}

impl TargetConfig {
    pub fn http_transport(&self) -> anyhow::Result<HttpJsonRpcTransport> {
        HttpJsonRpcTransport::new(self.rpc_urls.clone(), self.timeout_ms, self.max_connections)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// JSON file of `[{address, private_key}]`
    pub path: String,
    /// Accounts to generate when the file is missing
    #[serde(default = "default_generate_count")]
    pub generate_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSection {
    pub target_tps: u64,
    pub batch_size: u64,
    pub senders_per_batch: usize,
    pub duration_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_progress_every_ms")]
    pub progress_every_ms: u64,
    /// Deterministic sender/recipient selection
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub chain_id: u64,
    /// Transfer value in wei (u128 as string to preserve precision)
    pub value_wei: String,
    pub gas_limit: u64,
    /// Gas price in wei (u128 as string)
    pub gas_price_wei: String,
}

impl TransactionConfig {
    pub fn transfer(&self) -> Result<TransferTemplate, BenchError> {
        Ok(TransferTemplate {
            value: parse_wei("transaction.value_wei", &self.value_wei)?,
            gas_limit: self.gas_limit,
            gas_price: parse_wei("transaction.gas_price_wei", &self.gas_price_wei)?,
            chain_id: self.chain_id,
        })
    }
}

fn parse_wei(field: &str, value: &str) -> Result<u128, BenchError> {
    value
        .trim()
        .parse::<u128>()
        .map_err(|e| BenchError::Configuration(format!("{field} = {value:?}: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    pub poll_interval_ms: u64,
    pub baseline_duration_ms: u64,
    pub loaded_duration_ms: u64,
    pub rolling_window: usize,
    pub startup_attempts: u32,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            baseline_duration_ms: 30_000,
            loaded_duration_ms: 30_000,
            rolling_window: 10,
            startup_attempts: 3,
        }
    }
}

impl MonitorSection {
    fn to_monitor_config(&self, duration_ms: u64) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            duration: Duration::from_millis(duration_ms),
            rolling_window: self.rolling_window,
            startup_attempts: self.startup_attempts,
            ..MonitorConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub target_interval_ms: f64,
    pub acceptable_interval_ms: f64,
    pub target_throughput: f64,
    pub min_throughput: f64,
    /// Extra interval limits reported alongside target and acceptable
    #[serde(default)]
    pub report_bands_ms: Vec<f64>,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        let defaults = VerdictThresholds::default();
        Self {
            target_interval_ms: defaults.target_interval_ms,
            acceptable_interval_ms: defaults.acceptable_interval_ms,
            target_throughput: defaults.target_throughput,
            min_throughput: defaults.min_throughput,
            report_bands_ms: vec![150.0],
        }
    }
}

impl ThresholdsConfig {
    /// Every reported band limit, ascending and without repeats.
    pub fn bands_ms(&self) -> Vec<f64> {
        let mut bands = vec![self.target_interval_ms, self.acceptable_interval_ms];
        bands.extend(self.report_bands_ms.iter().copied());
        bands.sort_by(f64::total_cmp);
        bands.dedup();
        bands
    }
}

fn default_generate_count() -> usize {
    100
}

fn default_max_in_flight() -> usize {
    256
}

fn default_progress_every_ms() -> u64 {
    1000
}
