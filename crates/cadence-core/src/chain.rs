//! Typed wrappers over the handful of read calls the harness issues.

use crate::error::TransportError;
use crate::transport::Transport;
use serde_json::{json, Value};

/// Block number and header timestamp (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub timestamp: u64,
}

/// Parse an `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &Value) -> Result<u64, TransportError> {
    let s = value
        .as_str()
        .ok_or_else(|| TransportError::Decode(format!("expected hex quantity, got {value}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| TransportError::Decode(format!("bad quantity {s}: {e}")))
}

/// Like [`parse_quantity`] for values that can exceed `u64` (balances).
pub fn parse_quantity_u128(value: &Value) -> Result<u128, TransportError> {
    let s = value
        .as_str()
        .ok_or_else(|| TransportError::Decode(format!("expected hex quantity, got {value}")))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u128::from_str_radix(digits, 16)
        .map_err(|e| TransportError::Decode(format!("bad quantity {s}: {e}")))
}

pub async fn block_number(transport: &dyn Transport) -> Result<u64, TransportError> {
    let result = transport.query("eth_blockNumber", json!([])).await?;
    parse_quantity(&result)
}

pub async fn chain_id(transport: &dyn Transport) -> Result<u64, TransportError> {
    let result = transport.query("eth_chainId", json!([])).await?;
    parse_quantity(&result)
}

/// Pending transaction count, i.e. the next usable nonce for `address`.
pub async fn pending_nonce(transport: &dyn Transport, address: &str) -> Result<u64, TransportError> {
    let result = transport
        .query("eth_getTransactionCount", json!([address, "pending"]))
        .await?;
    parse_quantity(&result)
}

pub async fn balance(transport: &dyn Transport, address: &str) -> Result<u128, TransportError> {
    let result = transport
        .query("eth_getBalance", json!([address, "latest"]))
        .await?;
    parse_quantity_u128(&result)
}

/// `eth_syncing` answers `false` or a progress object.
pub async fn is_syncing(transport: &dyn Transport) -> Result<bool, TransportError> {
    let result = transport.query("eth_syncing", json!([])).await?;
    Ok(result.as_bool() != Some(false))
}

/// Header of block `number`, or of the latest block when `None`.
pub async fn block_header(
    transport: &dyn Transport,
    number: Option<u64>,
) -> Result<BlockHeader, TransportError> {
    let tag = match number {
        Some(n) => format!("{n:#x}"),
        None => "latest".to_string(),
    };
    let block = transport
        .query("eth_getBlockByNumber", json!([tag, false]))
        .await?;
    if block.is_null() {
        return Err(TransportError::Decode(format!("block {tag} not found")));
    }
    Ok(BlockHeader {
        number: parse_quantity(&block["number"])?,
        timestamp: parse_quantity(&block["timestamp"])?,
    })
}
