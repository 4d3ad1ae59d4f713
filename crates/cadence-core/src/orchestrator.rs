//! Phase sequencing: an idle chain is measured first, then the same chain
//! under load, then both are reduced to a verdict.

use crate::accounts::AccountPool;
use crate::chain;
use crate::config::Config;
use crate::error::BenchError;
use crate::load::{LoadConfig, LoadGenerator, LoadReport};
use crate::monitor::{BlockMonitor, MonitorConfig, MonitorReport};
use crate::signer::TxSigner;
use crate::stats::{self, PhaseStatistics, ThresholdBand};
use crate::transport::Transport;
use crate::verdict::{self, Verdict, VerdictThresholds, VerdictTier};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

const SEED_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Baseline,
    Loaded,
    Analyzed,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Failed(String),
}

/// Outcome of one monitored phase. Present even when the phase failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: RunPhase,
    pub status: PhaseStatus,
    pub statistics: Option<PhaseStatistics>,
    pub bands: Vec<ThresholdBand>,
    pub blocks_observed: u64,
    pub wall_clock_mean_ms: Option<f64>,
    pub monitor: Option<MonitorReport>,
}

impl PhaseResult {
    fn completed(phase: RunPhase, report: MonitorReport, bands_ms: &[f64]) -> Self {
        let intervals = report.intervals_ms();
        Self {
            phase,
            status: PhaseStatus::Completed,
            statistics: stats::summarize(&intervals),
            bands: stats::threshold_bands(&intervals, bands_ms),
            blocks_observed: report.blocks_observed(),
            wall_clock_mean_ms: report.wall_clock_mean_ms(),
            monitor: Some(report),
        }
    }

    fn failed(phase: RunPhase, reason: String) -> Self {
        Self {
            phase,
            status: PhaseStatus::Failed(reason),
            statistics: None,
            bands: Vec::new(),
            blocks_observed: 0,
            wall_clock_mean_ms: None,
            monitor: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PhaseStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub transport: String,
    pub accounts: usize,
    pub baseline: PhaseResult,
    pub loaded: PhaseResult,
    pub load: Option<LoadReport>,
    /// Loaded mean minus baseline mean, when both exist.
    pub cadence_shift_ms: Option<f64>,
    pub thresholds: VerdictThresholds,
    pub verdict: Verdict,
}

/// Owns every collaborator for one run. No state outlives [`run`](Self::run).
pub struct Orchestrator {
    pool: Arc<AccountPool>,
    transport: Arc<dyn Transport>,
    generator: LoadGenerator,
    baseline: MonitorConfig,
    loaded: MonitorConfig,
    thresholds: VerdictThresholds,
    bands_ms: Vec<f64>,
    phase: RunPhase,
}

impl Orchestrator {
    /// All structural checks happen here, before any phase starts.
    pub fn new(
        pool: Arc<AccountPool>,
        signer: Arc<dyn TxSigner>,
        transport: Arc<dyn Transport>,
        load: LoadConfig,
        baseline: MonitorConfig,
        loaded: MonitorConfig,
        thresholds: VerdictThresholds,
    ) -> Result<Self, BenchError> {
        if loaded.duration < load.duration {
            return Err(BenchError::Configuration(format!(
                "loaded monitor duration {:?} is shorter than load duration {:?}",
                loaded.duration, load.duration
            )));
        }
        let generator = LoadGenerator::new(pool.clone(), signer, transport.clone(), load)?;
        let bands_ms = vec![thresholds.target_interval_ms, thresholds.acceptable_interval_ms];
        Ok(Self {
            pool,
            transport,
            generator,
            baseline,
            loaded,
            thresholds,
            bands_ms,
            phase: RunPhase::Idle,
        })
    }

    pub fn from_config(
        config: &Config,
        pool: Arc<AccountPool>,
        signer: Arc<dyn TxSigner>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BenchError> {
        config.validate()?;
        let orchestrator = Self::new(
            pool,
            signer,
            transport,
            config.load_config()?,
            config.baseline_monitor(),
            config.loaded_monitor(),
            config.verdict_thresholds(),
        )?;
        Ok(orchestrator.with_bands(config.thresholds.bands_ms()))
    }

    /// Replace the reported interval bands.
    pub fn with_bands(mut self, bands_ms: Vec<f64>) -> Self {
        self.bands_ms = bands_ms;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn transition(&mut self, next: RunPhase) {
        info!("Phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Run every phase. Always yields a report with a verdict.
    pub async fn run(&mut self) -> RunReport {
        let started_at = chrono::Utc::now().to_rfc3339();

        self.transition(RunPhase::Baseline);
        let baseline = self.run_baseline().await;

        self.transition(RunPhase::Loaded);
        let (loaded, load) = self.run_loaded().await;

        self.transition(RunPhase::Analyzed);
        let throughput = load.as_ref().map(|l| l.achieved_tps).unwrap_or(0.0);
        let verdict = match &loaded.status {
            PhaseStatus::Completed => {
                verdict::evaluate(loaded.statistics.as_ref(), throughput, &self.thresholds)
            }
            PhaseStatus::Failed(reason) => Verdict {
                tier: VerdictTier::Failing,
                mean_interval_ms: None,
                throughput,
                reason: format!("loaded phase failed: {reason}"),
            },
        };
        let cadence_shift_ms = match (&baseline.statistics, &loaded.statistics) {
            (Some(b), Some(l)) => Some(l.mean - b.mean),
            _ => None,
        };
        info!("Verdict: {} ({})", verdict.tier, verdict.reason);

        self.transition(RunPhase::Done);
        RunReport {
            started_at,
            transport: self.transport.name().to_string(),
            accounts: self.pool.len(),
            baseline,
            loaded,
            load,
            cadence_shift_ms,
            thresholds: self.thresholds,
            verdict,
        }
    }

    async fn run_baseline(&self) -> PhaseResult {
        let monitor = BlockMonitor::new(self.transport.clone(), self.baseline.clone(), "baseline");
        match monitor.run().await {
            Ok(report) => PhaseResult::completed(RunPhase::Baseline, report, &self.bands_ms),
            Err(e) => {
                error!("Baseline phase failed: {}", e);
                PhaseResult::failed(RunPhase::Baseline, e.to_string())
            }
        }
    }

    async fn run_loaded(&self) -> (PhaseResult, Option<LoadReport>) {
        if let Err(e) = self.seed_nonces().await {
            error!("Loaded phase failed: {}", e);
            return (PhaseResult::failed(RunPhase::Loaded, e.to_string()), None);
        }

        let monitor = BlockMonitor::new(self.transport.clone(), self.loaded.clone(), "loaded");
        let (load, cadence) = tokio::join!(self.generator.run(), monitor.run());

        let result = match cadence {
            Ok(report) => PhaseResult::completed(RunPhase::Loaded, report, &self.bands_ms),
            Err(e) => {
                error!("Loaded phase monitor failed: {}", e);
                PhaseResult::failed(RunPhase::Loaded, e.to_string())
            }
        };
        (result, Some(load))
    }

    /// Start every counter at the account's live pending nonce.
    async fn seed_nonces(&self) -> Result<(), BenchError> {
        info!("Seeding nonces for {} accounts", self.pool.len());
        let transport = self.transport.as_ref();
        let seeded: Vec<(String, u64)> = stream::iter(self.pool.addresses().map(str::to_string))
            .map(|address| async move {
                chain::pending_nonce(transport, &address)
                    .await
                    .map(|nonce| (address, nonce))
                    .map_err(|source| BenchError::EndpointUnreachable { attempts: 1, source })
            })
            .buffer_unordered(SEED_CONCURRENCY)
            .try_collect()
            .await?;

        for (address, nonce) in seeded {
            self.pool.seed(&address, nonce)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SigningError, TransportError};
    use crate::load::TransferTemplate;
    use crate::signer::TransactionIntent;
    use crate::transport::{BoxFuture, MockTransport, SubmissionOutcome};
    use serde_json::{json, Value};
    use std::time::Duration;

    struct EchoSigner;

    impl TxSigner for EchoSigner {
        fn sign(&self, intent: &TransactionIntent) -> Result<Vec<u8>, SigningError> {
            Ok(intent.nonce.to_be_bytes().to_vec())
        }
    }

    /// Height never moves; every account already has 5 pending transactions.
    struct StalledChain;

    impl Transport for StalledChain {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn submit<'a>(&'a self, _raw_tx: &'a [u8]) -> BoxFuture<'a, SubmissionOutcome> {
            Box::pin(async { SubmissionOutcome::Accepted })
        }

        fn query<'a>(&'a self, method: &'a str, _params: Value) -> BoxFuture<'a, Result<Value, TransportError>> {
            Box::pin(async move {
                match method {
                    "eth_blockNumber" => Ok(json!("0x10")),
                    "eth_getTransactionCount" => Ok(json!("0x5")),
                    _ => Err(TransportError::Rpc {
                        code: -32601,
                        message: "not found".into(),
                    }),
                }
            })
        }
    }

    struct DeadEndpoint;

    impl Transport for DeadEndpoint {
        fn name(&self) -> &'static str {
            "dead"
        }

        fn submit<'a>(&'a self, _raw_tx: &'a [u8]) -> BoxFuture<'a, SubmissionOutcome> {
            Box::pin(async {
                SubmissionOutcome::TransportError(TransportError::Connection("refused".into()))
            })
        }

        fn query<'a>(&'a self, _method: &'a str, _params: Value) -> BoxFuture<'a, Result<Value, TransportError>> {
            Box::pin(async { Err(TransportError::Connection("refused".into())) })
        }
    }

    fn pool() -> Arc<AccountPool> {
        Arc::new(AccountPool::new((0..10).map(|i| format!("0x{:02x}", i))))
    }

    fn load_config(secs: u64) -> LoadConfig {
        LoadConfig {
            target_tps: 100,
            batch_size: 20,
            senders_per_batch: 10,
            duration: Duration::from_secs(secs),
            max_in_flight: 64,
            progress_every: Duration::from_secs(1),
            seed: Some(7),
            transfer: TransferTemplate {
                value: 1,
                gas_limit: 21_000,
                gas_price: 1,
                chain_id: 1,
            },
        }
    }

    fn monitor_config(secs: u64) -> MonitorConfig {
        MonitorConfig {
            duration: Duration::from_secs(secs),
            ..MonitorConfig::default()
        }
    }

    fn lenient() -> VerdictThresholds {
        VerdictThresholds {
            target_interval_ms: 90.0,
            acceptable_interval_ms: 100.0,
            min_throughput: 50.0,
            target_throughput: 1000.0,
        }
    }

    fn orchestrator(transport: Arc<dyn Transport>, pool: Arc<AccountPool>) -> Orchestrator {
        Orchestrator::new(
            pool,
            Arc::new(EchoSigner),
            transport,
            load_config(5),
            monitor_config(2),
            monitor_config(5),
            lenient(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_against_mock_chain() {
        let transport = Arc::new(MockTransport::new(5, 85, 713714));
        let mut orchestrator = orchestrator(transport, pool());
        assert_eq!(orchestrator.phase(), RunPhase::Idle);

        let report = orchestrator.run().await;

        assert_eq!(orchestrator.phase(), RunPhase::Done);
        assert!(report.baseline.is_completed());
        assert!(report.loaded.is_completed());

        let load = report.load.as_ref().unwrap();
        assert!((480..=520).contains(&load.sent), "sent {}", load.sent);
        assert_eq!(load.failed, 0);

        let loaded = report.loaded.statistics.as_ref().unwrap();
        assert!((loaded.mean - 85.0).abs() < 2.0, "mean {}", loaded.mean);
        assert!(report.cadence_shift_ms.unwrap().abs() < 5.0);

        // Fast blocks but 100 tx/s is short of the 1000 tx/s target tier.
        assert_eq!(report.verdict.tier, VerdictTier::Acceptable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_chain_fails_with_no_data() {
        let pool = pool();
        let mut orchestrator = orchestrator(Arc::new(StalledChain), pool.clone());

        let report = orchestrator.run().await;

        assert!(report.loaded.is_completed());
        assert_eq!(report.loaded.statistics, None);
        assert_eq!(report.loaded.blocks_observed, 0);
        assert_eq!(report.verdict.tier, VerdictTier::Failing);
        assert_eq!(report.verdict.reason, "no blocks observed under load");
        for address in pool.addresses() {
            assert!(pool.nonce(address).unwrap() >= 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_endpoint_still_reports() {
        let mut orchestrator = orchestrator(Arc::new(DeadEndpoint), pool());

        let report = orchestrator.run().await;

        assert!(matches!(report.baseline.status, PhaseStatus::Failed(_)));
        assert!(matches!(report.loaded.status, PhaseStatus::Failed(_)));
        assert_eq!(report.load, None);
        assert_eq!(report.verdict.tier, VerdictTier::Failing);
        assert!(report.verdict.reason.starts_with("loaded phase failed"));
        assert_eq!(orchestrator.phase(), RunPhase::Done);
    }

    #[test]
    fn test_monitor_shorter_than_load_is_rejected() {
        let result = Orchestrator::new(
            pool(),
            Arc::new(EchoSigner),
            Arc::new(StalledChain),
            load_config(5),
            monitor_config(2),
            monitor_config(4),
            lenient(),
        );
        assert!(matches!(result, Err(BenchError::Configuration(_))));
    }

    #[test]
    fn test_zero_accounts_rejected_before_any_phase() {
        let result = Orchestrator::new(
            Arc::new(AccountPool::new(Vec::<String>::new())),
            Arc::new(EchoSigner),
            Arc::new(StalledChain),
            load_config(5),
            monitor_config(2),
            monitor_config(5),
            lenient(),
        );
        assert!(matches!(
            result,
            Err(BenchError::InsufficientAccounts { .. })
        ));
    }
}
