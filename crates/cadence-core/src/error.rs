//! Error taxonomy for the harness.
//!
//! Only structural failures are errors. Per-request failures (rejections,
//! transport errors on a single submission or poll) are counted outcomes and
//! never surface through these types.

use std::time::Duration;

/// Structural failures that stop a run or a phase.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Invalid rate/duration/account-count combination, raised before any phase starts.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("insufficient accounts: {available} available, at least {required} required")]
    InsufficientAccounts { available: usize, required: usize },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// The endpoint could not be reached when a phase started.
    #[error("endpoint unreachable after {attempts} attempt(s): {source}")]
    EndpointUnreachable {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("account store: {0}")]
    Store(#[from] StoreError),
}

/// Failure of a single transport call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("http status {0}")]
    Http(u16),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Failure to turn an intent into wire bytes. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SigningError {
    #[error("no signing key for {0}")]
    MissingKey(String),

    #[error("malformed signing key for {address}: {reason}")]
    MalformedKey { address: String, reason: String },

    #[error("malformed recipient address {0}")]
    MalformedRecipient(String),

    #[error("signer failed: {0}")]
    Signer(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid account file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether the underlying file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
