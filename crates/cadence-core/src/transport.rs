use crate::error::TransportError;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How the endpoint answered a single submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Taken into the endpoint's pending pool. Says nothing about inclusion.
    Accepted,
    Rejected(String),
    TransportError(TransportError),
}

/// Trait for the RPC boundary shared by the load generator and the monitor.
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit signed wire bytes.
    fn submit<'a>(&'a self, raw_tx: &'a [u8]) -> BoxFuture<'a, SubmissionOutcome>;

    /// Issue an arbitrary read call.
    fn query<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Result<Value, TransportError>>;
}

/// JSON-RPC 2.0 over HTTP, round-robin across endpoints, with a hard cap on
/// concurrent requests so the harness's own load cannot starve polling.
pub struct HttpJsonRpcTransport {
    client: reqwest::Client,
    urls: Vec<String>,
    current_url_idx: AtomicUsize,
    next_id: AtomicU64,
    connections: Semaphore,
    timeout: Duration,
}

impl HttpJsonRpcTransport {
    pub fn new(urls: Vec<String>, timeout_ms: u64, max_connections: usize) -> anyhow::Result<Self> {
        if urls.is_empty() {
            anyhow::bail!("at least one RPC url is required");
        }
        let max_connections = max_connections.max(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(max_connections)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            urls,
            current_url_idx: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            connections: Semaphore::new(max_connections),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    fn next_url(&self) -> &str {
        let idx = self.current_url_idx.fetch_add(1, Ordering::Relaxed);
        &self.urls[idx % self.urls.len()]
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| TransportError::Connection("transport closed".to_string()))?;

        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .client
            .post(self.next_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Decode(e.to_string())
            }
        })?;
        parse_rpc_response(body)
    }

    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

/// Split a JSON-RPC response envelope into its result or error.
pub fn parse_rpc_response(body: Value) -> Result<Value, TransportError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(TransportError::Rpc { code, message });
    }
    body.get("result")
        .cloned()
        .ok_or_else(|| TransportError::Decode("response has neither result nor error".to_string()))
}

impl Transport for HttpJsonRpcTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn submit<'a>(&'a self, raw_tx: &'a [u8]) -> BoxFuture<'a, SubmissionOutcome> {
        Box::pin(async move {
            let params = json!([format!("0x{}", hex::encode(raw_tx))]);
            match self.call("eth_sendRawTransaction", params).await {
                Ok(_) => SubmissionOutcome::Accepted,
                Err(TransportError::Rpc { code, message }) => {
                    SubmissionOutcome::Rejected(format!("{code}: {message}"))
                }
                Err(TransportError::Http(status)) => {
                    SubmissionOutcome::Rejected(format!("http status {status}"))
                }
                Err(e) => SubmissionOutcome::TransportError(e),
            }
        })
    }

    fn query<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Result<Value, TransportError>> {
        Box::pin(self.call(method, params))
    }
}

/// In-process stand-in for a node: accepts submissions after a fixed delay
/// and produces blocks on a fixed cadence.
pub struct MockTransport {
    delay: Duration,
    block_interval: Duration,
    chain_id: u64,
    genesis: Instant,
    submit_outcome: SubmissionOutcome,
    submitted: AtomicU64,
}

impl MockTransport {
    pub fn new(delay_ms: u64, block_interval_ms: u64, chain_id: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            block_interval: Duration::from_millis(block_interval_ms.max(1)),
            chain_id,
            genesis: Instant::now(),
            submit_outcome: SubmissionOutcome::Accepted,
            submitted: AtomicU64::new(0),
        }
    }

    /// Answer every submission with `outcome` instead of accepting it.
    pub fn with_submit_outcome(mut self, outcome: SubmissionOutcome) -> Self {
        self.submit_outcome = outcome;
        self
    }

    /// Number of submissions received so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    fn height(&self) -> u64 {
        (self.genesis.elapsed().as_micros() / self.block_interval.as_micros()) as u64
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn submit<'a>(&'a self, _raw_tx: &'a [u8]) -> BoxFuture<'a, SubmissionOutcome> {
        Box::pin(async move {
            sleep(self.delay).await;
            self.submitted.fetch_add(1, Ordering::SeqCst);
            self.submit_outcome.clone()
        })
    }

    fn query<'a>(&'a self, method: &'a str, params: Value) -> BoxFuture<'a, Result<Value, TransportError>> {
        Box::pin(async move {
            match method {
                "eth_blockNumber" => Ok(json!(format!("{:#x}", self.height()))),
                "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id))),
                "net_version" => Ok(json!(self.chain_id.to_string())),
                "eth_gasPrice" => Ok(json!("0x2540be400")),
                "eth_syncing" => Ok(json!(false)),
                "eth_getTransactionCount" => Ok(json!("0x0")),
                "eth_getBalance" => Ok(json!("0xde0b6b3a7640000")),
                "eth_getBlockByNumber" => {
                    let height = match params.get(0).and_then(Value::as_str) {
                        Some("latest") | None => self.height(),
                        Some(tag) => crate::chain::parse_quantity(&json!(tag))?,
                    };
                    let timestamp = height * self.block_interval.as_millis() as u64 / 1000;
                    Ok(json!({
                        "number": format!("{:#x}", height),
                        "timestamp": format!("{:#x}", timestamp),
                    }))
                }
                other => Err(TransportError::Rpc {
                    code: -32601,
                    message: format!("method {other} not found"),
                }),
            }
        })
    }
}
