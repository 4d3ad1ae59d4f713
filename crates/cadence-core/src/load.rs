//! Rate-controlled transaction dispatch.

use crate::accounts::AccountPool;
use crate::error::{BenchError, SigningError};
use crate::pacer::BatchPacer;
use crate::signer::{TransactionIntent, TxSigner};
use crate::stats::{self, OutcomeCounters, PhaseStatistics};
use crate::transport::{SubmissionOutcome, Transport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fixed parameters of every generated transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTemplate {
    pub value: u128,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
}

impl TransferTemplate {
    /// Upper bound on what one transfer costs its sender, saturating at
    /// `u128::MAX`.
    pub fn max_cost(&self) -> u128 {
        (self.gas_limit as u128)
            .saturating_mul(self.gas_price)
            .saturating_add(self.value)
    }
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub target_tps: u64,
    pub batch_size: u64,
    pub senders_per_batch: usize,
    pub duration: Duration,
    /// Cap on concurrently outstanding submissions. Must cover the largest
    /// per-sender share of a batch.
    pub max_in_flight: usize,
    pub progress_every: Duration,
    /// Seed for sender/recipient selection; entropy when absent.
    pub seed: Option<u64>,
    pub transfer: TransferTemplate,
}

/// Counters and rates for one load phase. Read only after full drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub target_tps: u64,
    pub duration_ms: u64,
    /// Dispatch start to drain completion.
    pub elapsed_ms: u64,
    pub batches: u64,
    /// Batches that took longer than their pacing slot.
    pub overruns: u64,
    pub attempted: u64,
    pub sent: u64,
    pub failed: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub signing_errors: u64,
    /// `sent` over the configured duration.
    pub achieved_tps: f64,
    pub achievement_pct: f64,
    pub submit_latency: Option<PhaseStatistics>,
}

enum Completion {
    Submitted {
        outcome: SubmissionOutcome,
        latency: Duration,
    },
    SigningFailed(SigningError),
}

/// Drives signed submissions at a target rate over a shared account pool.
pub struct LoadGenerator {
    pool: Arc<AccountPool>,
    signer: Arc<dyn TxSigner>,
    transport: Arc<dyn Transport>,
    config: LoadConfig,
    max_in_flight: u32,
}

/// Semaphore size for `max_in_flight`, rejected when zero or too large to
/// drain with a single `acquire_many`.
pub(crate) fn permit_budget(max_in_flight: usize) -> Result<u32, BenchError> {
    u32::try_from(max_in_flight)
        .ok()
        .filter(|&permits| permits > 0 && (permits as usize) <= Semaphore::MAX_PERMITS)
        .ok_or_else(|| {
            BenchError::Configuration(format!(
                "max_in_flight must be between 1 and {} (got {})",
                u32::MAX,
                max_in_flight
            ))
        })
}

impl LoadGenerator {
    pub fn new(
        pool: Arc<AccountPool>,
        signer: Arc<dyn TxSigner>,
        transport: Arc<dyn Transport>,
        config: LoadConfig,
    ) -> Result<Self, BenchError> {
        if pool.is_empty() {
            return Err(BenchError::InsufficientAccounts {
                available: 0,
                required: 1,
            });
        }
        if config.target_tps == 0 || config.batch_size == 0 || config.senders_per_batch == 0 {
            return Err(BenchError::Configuration(
                "target_tps, batch_size and senders_per_batch must be positive".to_string(),
            ));
        }
        let max_in_flight = permit_budget(config.max_in_flight)?;
        // A sender's share is dispatched only once all of its permits are held.
        let largest_share = share(config.batch_size, config.senders_per_batch.min(pool.len()), 0);
        if largest_share > u64::from(max_in_flight) {
            return Err(BenchError::Configuration(format!(
                "max_in_flight ({}) is below the largest per-sender share of a batch ({})",
                max_in_flight, largest_share
            )));
        }
        Ok(Self {
            pool,
            signer,
            transport,
            config,
            max_in_flight,
        })
    }

    /// Senders per batch after clamping to the pool size.
    pub fn effective_senders(&self) -> usize {
        self.config.senders_per_batch.min(self.pool.len())
    }

    /// Dispatch until the deadline, then wait for every in-flight
    /// submission before reading the counters.
    pub async fn run(&self) -> LoadReport {
        let pacer = BatchPacer::new(self.config.batch_size, self.config.target_tps);
        let senders = self.effective_senders();
        let transfer = self.config.transfer;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "Load: {} tx/s for {:?}, batch {} every {:?} across {} senders",
            self.config.target_tps,
            self.config.duration,
            pacer.batch_size(),
            pacer.interval(),
            senders
        );
        if (senders as u64) > self.config.batch_size {
            warn!(
                "More senders ({}) than transactions per batch ({}); some senders idle",
                senders, self.config.batch_size
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight as usize));
        let (result_tx, result_rx) = mpsc::channel::<Completion>(10_000);

        let start = Instant::now();
        let collector = tokio::spawn(collect(result_rx, start, self.config.progress_every));

        let mut batches = 0u64;
        let mut overruns = 0u64;

        'dispatch: while start.elapsed() < self.config.duration {
            let tick = Instant::now();
            batches += 1;

            let picked = rand::seq::index::sample(&mut rng, self.pool.len(), senders);
            for (slot, sender_idx) in picked.into_iter().enumerate() {
                let count = share(self.config.batch_size, senders, slot);
                if count == 0 {
                    continue;
                }

                let mut permits = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permits.push(permit),
                        Err(e) => {
                            warn!("Dispatch stopped: {}", e);
                            break 'dispatch;
                        }
                    }
                }
                // Waiting for capacity can cross the deadline; nothing new starts after it.
                if start.elapsed() >= self.config.duration {
                    debug!("Deadline passed while batch {} waited for capacity", batches);
                    break 'dispatch;
                }

                let sender = self.pool.address(sender_idx).to_string();
                // Committed before signing: a signing failure still burns its nonce.
                let first_nonce = self.pool.reserve_at(sender_idx, count);

                for (offset, permit) in permits.into_iter().enumerate() {
                    let recipient = pick_other(&mut rng, self.pool.len(), sender_idx);
                    let intent = TransactionIntent {
                        sender: sender.clone(),
                        recipient: self.pool.address(recipient).to_string(),
                        value: transfer.value,
                        gas_limit: transfer.gas_limit,
                        gas_price: transfer.gas_price,
                        nonce: first_nonce + offset as u64,
                        chain_id: transfer.chain_id,
                    };
                    let signer = self.signer.clone();
                    let transport = self.transport.clone();
                    let result_tx = result_tx.clone();

                    tokio::spawn(async move {
                        let completion = match signer.sign(&intent) {
                            Ok(raw) => {
                                let sent_at = Instant::now();
                                let outcome = transport.submit(&raw).await;
                                Completion::Submitted {
                                    outcome,
                                    latency: sent_at.elapsed(),
                                }
                            }
                            Err(e) => Completion::SigningFailed(e),
                        };
                        let _ = result_tx.send(completion).await;
                        drop(permit);
                    });
                }
            }

            if pacer.pace(tick).await {
                overruns += 1;
                debug!("Batch {} overran its {:?} slot", batches, pacer.interval());
            }
        }

        info!("Load deadline reached after {} batches, draining in-flight submissions", batches);
        if let Err(e) = semaphore.acquire_many(self.max_in_flight).await {
            warn!("Drain interrupted, counters may be incomplete: {}", e);
        }
        drop(result_tx);

        let counters = match collector.await {
            Ok(counters) => counters,
            Err(e) => {
                warn!("Outcome collector failed: {}", e);
                OutcomeCounters::new()
            }
        };
        let elapsed = start.elapsed();

        let achieved_tps = stats::throughput(counters.sent, self.config.duration);
        let report = LoadReport {
            target_tps: self.config.target_tps,
            duration_ms: self.config.duration.as_millis() as u64,
            elapsed_ms: elapsed.as_millis() as u64,
            batches,
            overruns,
            attempted: counters.attempted,
            sent: counters.sent,
            failed: counters.failed,
            rejected: counters.rejected,
            transport_errors: counters.transport_errors,
            signing_errors: counters.signing_errors,
            achieved_tps,
            achievement_pct: achieved_tps / self.config.target_tps as f64 * 100.0,
            submit_latency: stats::summarize(counters.latencies_ms()),
        };

        info!(
            "Load complete: sent={} failed={} achieved {:.0} tx/s ({:.1}% of target)",
            report.sent, report.failed, report.achieved_tps, report.achievement_pct
        );
        report
    }
}

/// Transactions for the `slot`-th sender of a batch; the remainder of an
/// uneven split goes to the first senders.
fn share(batch_size: u64, senders: usize, slot: usize) -> u64 {
    let senders = senders as u64;
    let base = batch_size / senders;
    if (slot as u64) < batch_size % senders {
        base + 1
    } else {
        base
    }
}

/// Uniform pick among the pool excluding `sender`. A single-account pool
/// sends to itself.
fn pick_other<R: Rng>(rng: &mut R, len: usize, sender: usize) -> usize {
    if len < 2 {
        return sender;
    }
    let idx = rng.gen_range(0..len - 1);
    if idx >= sender {
        idx + 1
    } else {
        idx
    }
}

async fn collect(
    mut rx: mpsc::Receiver<Completion>,
    start: Instant,
    progress_every: Duration,
) -> OutcomeCounters {
    let mut counters = OutcomeCounters::new();
    let every = progress_every.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(start + every, every);

    loop {
        tokio::select! {
            completion = rx.recv() => match completion {
                Some(Completion::Submitted { outcome, latency }) => {
                    if let SubmissionOutcome::TransportError(e) = &outcome {
                        debug!("Submission failed: {}", e);
                    }
                    counters.record(&outcome, latency);
                }
                Some(Completion::SigningFailed(e)) => {
                    warn!("Signing failed: {}", e);
                    counters.record_signing_error();
                }
                None => break,
            },
            _ = ticker.tick() => {
                let tps = stats::throughput(counters.sent, start.elapsed());
                info!(
                    "Progress: attempted={} sent={} failed={} tps={:.0}",
                    counters.attempted, counters.sent, counters.failed, tps
                );
            }
        }
    }
    counters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{BoxFuture, MockTransport};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    /// Encodes the intent as `sender:nonce:recipient` instead of signing.
    struct EchoSigner;

    impl TxSigner for EchoSigner {
        fn sign(&self, intent: &TransactionIntent) -> Result<Vec<u8>, SigningError> {
            Ok(format!("{}:{}:{}", intent.sender, intent.nonce, intent.recipient).into_bytes())
        }
    }

    struct BrokenSigner;

    impl TxSigner for BrokenSigner {
        fn sign(&self, intent: &TransactionIntent) -> Result<Vec<u8>, SigningError> {
            Err(SigningError::MissingKey(intent.sender.clone()))
        }
    }

    /// Records each submission and when it started, then answers after a
    /// fixed delay. One sender can be given a slower delay.
    struct RecordingTransport {
        started: Instant,
        delay: Duration,
        slow: Option<(String, Duration)>,
        seen: StdMutex<Vec<(String, Duration)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingTransport {
        fn new(delay_ms: u64) -> Self {
            Self {
                started: Instant::now(),
                delay: Duration::from_millis(delay_ms),
                slow: None,
                seen: StdMutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn with_slow_sender(mut self, sender: &str, delay_ms: u64) -> Self {
            self.slow = Some((sender.to_string(), Duration::from_millis(delay_ms)));
            self
        }

        fn seen(&self) -> Vec<(String, u64, String)> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|(s, _)| {
                    let parts: Vec<&str> = s.split(':').collect();
                    (parts[0].to_string(), parts[1].parse().unwrap(), parts[2].to_string())
                })
                .collect()
        }

        /// Start offsets of every submission, in arrival order.
        fn start_offsets(&self) -> Vec<Duration> {
            self.seen.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }

        fn start_offsets_for(&self, sender: &str) -> Vec<Duration> {
            let prefix = format!("{}:", sender);
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| s.starts_with(&prefix))
                .map(|(_, at)| *at)
                .collect()
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn submit<'a>(&'a self, raw_tx: &'a [u8]) -> BoxFuture<'a, SubmissionOutcome> {
            Box::pin(async move {
                let raw = String::from_utf8_lossy(raw_tx).into_owned();
                let delay = match &self.slow {
                    Some((sender, slow)) if raw.starts_with(&format!("{}:", sender)) => *slow,
                    _ => self.delay,
                };
                self.seen.lock().unwrap().push((raw, self.started.elapsed()));
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                sleep(delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                SubmissionOutcome::Accepted
            })
        }

        fn query<'a>(&'a self, _method: &'a str, _params: Value) -> BoxFuture<'a, Result<Value, TransportError>> {
            Box::pin(async { Err(TransportError::Connection("not a node".into())) })
        }
    }

    fn pool(n: usize) -> Arc<AccountPool> {
        Arc::new(AccountPool::new((0..n).map(|i| format!("0x{:02x}", i))))
    }

    fn config(tps: u64, batch: u64, senders: usize, secs: u64) -> LoadConfig {
        LoadConfig {
            target_tps: tps,
            batch_size: batch,
            senders_per_batch: senders,
            duration: Duration::from_secs(secs),
            max_in_flight: 64,
            progress_every: Duration::from_secs(1),
            seed: Some(42),
            transfer: TransferTemplate {
                value: 100_000_000_000_000,
                gas_limit: 21_000,
                gas_price: 10_000_000_000,
                chain_id: 713714,
            },
        }
    }

    fn total_nonces(pool: &AccountPool) -> u64 {
        pool.addresses().map(|a| pool.nonce(a).unwrap()).sum()
    }

    #[test]
    fn test_share_splits_remainder() {
        assert_eq!((0..10).map(|s| share(20, 10, s)).collect::<Vec<_>>(), vec![2; 10]);
        assert_eq!((0..3).map(|s| share(10, 3, s)).collect::<Vec<_>>(), vec![4, 3, 3]);
        assert_eq!(share(2, 4, 3), 0);
    }

    #[test]
    fn test_pick_other_never_picks_sender() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_ne!(pick_other(&mut rng, 5, 2), 2);
        }
        assert_eq!(pick_other(&mut rng, 1, 0), 0);
    }

    #[test]
    fn test_max_cost() {
        let t = config(1, 1, 1, 1).transfer;
        assert_eq!(t.max_cost(), 100_000_000_000_000 + 21_000 * 10_000_000_000);

        let huge = TransferTemplate {
            value: u128::MAX - 1,
            gas_price: u128::MAX / 2,
            ..t
        };
        assert_eq!(huge.max_cost(), u128::MAX);
    }

    #[test]
    fn test_permit_budget() {
        assert_eq!(permit_budget(256).unwrap(), 256);
        assert!(matches!(permit_budget(0), Err(BenchError::Configuration(_))));
        if let Ok(too_many) = usize::try_from(u64::from(u32::MAX) + 1) {
            assert!(matches!(permit_budget(too_many), Err(BenchError::Configuration(_))));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_in_flight_must_cover_a_sender_share() {
        let mut cfg = config(100, 20, 2, 1);
        cfg.max_in_flight = 9;
        let result = LoadGenerator::new(
            pool(4),
            Arc::new(EchoSigner),
            Arc::new(MockTransport::new(0, 85, 1)),
            cfg,
        );
        assert!(matches!(result, Err(BenchError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offered_rate_is_held() {
        let pool = pool(10);
        let transport = Arc::new(MockTransport::new(5, 85, 713714));
        let generator = LoadGenerator::new(
            pool.clone(),
            Arc::new(EchoSigner),
            transport.clone(),
            config(100, 20, 10, 5),
        )
        .unwrap();

        let report = generator.run().await;

        assert!((480..=520).contains(&report.sent), "sent {}", report.sent);
        assert_eq!(report.failed, 0);
        assert_eq!(report.attempted, report.sent);
        assert_eq!(transport.submitted(), report.sent);
        assert_eq!(total_nonces(&pool), report.attempted);
        assert!((report.achieved_tps - 100.0).abs() <= 4.0);
        assert!(report.submit_latency.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_accounts_is_rejected() {
        let result = LoadGenerator::new(
            pool(0),
            Arc::new(EchoSigner),
            Arc::new(MockTransport::new(0, 85, 1)),
            config(100, 20, 10, 1),
        );
        assert!(matches!(
            result,
            Err(BenchError::InsufficientAccounts { available: 0, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_batch_is_configuration_error() {
        let result = LoadGenerator::new(
            pool(2),
            Arc::new(EchoSigner),
            Arc::new(MockTransport::new(0, 85, 1)),
            config(100, 0, 1, 1),
        );
        assert!(matches!(result, Err(BenchError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_are_counted_not_fatal() {
        let transport = Arc::new(
            MockTransport::new(1, 85, 1)
                .with_submit_outcome(SubmissionOutcome::Rejected("nonce too low".into())),
        );
        let generator =
            LoadGenerator::new(pool(4), Arc::new(EchoSigner), transport, config(50, 10, 2, 1)).unwrap();

        let report = generator.run().await;

        assert_eq!(report.sent, 0);
        assert!(report.failed > 0);
        assert_eq!(report.failed, report.rejected);
        assert_eq!(report.achieved_tps, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signing_failure_still_consumes_nonces() {
        let pool = pool(3);
        let transport = Arc::new(MockTransport::new(0, 85, 1));
        let generator =
            LoadGenerator::new(pool.clone(), Arc::new(BrokenSigner), transport.clone(), config(30, 3, 3, 1))
                .unwrap();

        let report = generator.run().await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.signing_errors, report.attempted);
        assert_eq!(transport.submitted(), 0);
        assert_eq!(total_nonces(&pool), report.attempted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_account_submission_order_follows_nonces() {
        // Submissions outlast the batch interval so chains for one account overlap.
        let transport = Arc::new(RecordingTransport::new(30));
        let generator = LoadGenerator::new(
            pool(2),
            Arc::new(EchoSigner),
            transport.clone(),
            config(400, 4, 2, 1),
        )
        .unwrap();

        let report = generator.run().await;
        let seen = transport.seen();
        assert_eq!(seen.len() as u64, report.sent);

        let mut last: HashMap<String, u64> = HashMap::new();
        for (sender, nonce, recipient) in seen {
            assert_ne!(sender, recipient);
            if let Some(prev) = last.insert(sender.clone(), nonce) {
                assert_eq!(nonce, prev + 1, "{} went {} -> {}", sender, prev, nonce);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_submission_starts_after_deadline() {
        // 250ms submissions against a 100ms batch interval.
        let pool = pool(20);
        let transport = Arc::new(RecordingTransport::new(250));
        let mut cfg = config(1000, 100, 10, 1);
        cfg.max_in_flight = 512;
        let generator =
            LoadGenerator::new(pool.clone(), Arc::new(EchoSigner), transport.clone(), cfg).unwrap();

        let report = generator.run().await;

        assert_eq!(report.batches, 10);
        assert_eq!(report.sent, 1000);
        assert_eq!(report.achieved_tps, 1000.0);
        assert_eq!(total_nonces(&pool), report.attempted);

        let starts = transport.start_offsets();
        assert_eq!(starts.len(), 1000);
        let last = starts.iter().max().copied().unwrap();
        assert!(last < Duration::from_secs(1), "submission started at {:?}", last);
        // The drain still waits for the final batch.
        assert!(report.elapsed_ms >= 900 + 250, "elapsed {}", report.elapsed_ms);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cap_bounds_requests_not_senders() {
        let pool = pool(10);
        let transport = Arc::new(RecordingTransport::new(250));
        let mut cfg = config(100, 20, 10, 1);
        cfg.max_in_flight = 8;
        let generator =
            LoadGenerator::new(pool.clone(), Arc::new(EchoSigner), transport.clone(), cfg).unwrap();

        let report = generator.run().await;

        assert!(transport.peak() <= 8, "peak {}", transport.peak());
        assert!(report.sent > 0);
        assert!(report.sent < 100, "sent {}", report.sent);
        assert!(report.overruns > 0);
        // Capacity waits that cross the deadline leave no reserved-but-unsent nonces.
        assert_eq!(total_nonces(&pool), report.attempted);
        let last = transport.start_offsets().into_iter().max().unwrap();
        assert!(last < Duration::from_secs(1), "submission started at {:?}", last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sender_does_not_hold_back_others() {
        // One account answers in 5s, the rest in 10ms; every batch uses all four.
        let transport = Arc::new(RecordingTransport::new(10).with_slow_sender("0x00", 5_000));
        let mut cfg = config(40, 4, 4, 1);
        cfg.max_in_flight = 16;
        let generator = LoadGenerator::new(pool(4), Arc::new(EchoSigner), transport.clone(), cfg).unwrap();

        let report = generator.run().await;

        assert_eq!(report.batches, 10);
        assert_eq!(report.overruns, 0);
        assert_eq!(report.sent, 40);
        for sender in ["0x00", "0x01", "0x02", "0x03"] {
            let starts = transport.start_offsets_for(sender);
            assert_eq!(starts.len(), 10, "{}", sender);
            for (i, at) in starts.iter().enumerate() {
                let scheduled = Duration::from_millis(100 * i as u64);
                assert!(
                    *at >= scheduled && *at < scheduled + Duration::from_millis(5),
                    "{} submission {} started at {:?}",
                    sender,
                    i,
                    at
                );
            }
        }
        assert!(report.elapsed_ms >= 900 + 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_senders_are_distinct_within_a_batch() {
        let pool = pool(3);
        let generator = LoadGenerator::new(
            pool.clone(),
            Arc::new(EchoSigner),
            Arc::new(MockTransport::new(0, 85, 1)),
            config(30, 3, 3, 1),
        )
        .unwrap();

        let report = generator.run().await;

        // Every batch uses every account exactly once.
        for address in pool.addresses() {
            assert_eq!(pool.nonce(address).unwrap(), report.batches);
        }
    }
}
