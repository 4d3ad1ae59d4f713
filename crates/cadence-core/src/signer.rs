use crate::accounts::AccountRecord;
use crate::error::SigningError;
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use rand::RngCore;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

/// A value transfer waiting to be signed. Discarded once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub sender: String,
    pub recipient: String,
    pub value: u128,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: u64,
}

/// Turns intents into wire bytes.
pub trait TxSigner: Send + Sync {
    fn sign(&self, intent: &TransactionIntent) -> Result<Vec<u8>, SigningError>;
}

/// Holds the secp256k1 keys of every pool account and signs legacy
/// (EIP-155) transfers.
pub struct LocalKeySigner {
    keys: HashMap<String, Result<PrivateKeySigner, SigningError>>,
}

impl LocalKeySigner {
    /// Parse every record's key. Malformed keys are kept as errors so that
    /// signing for that account fails instead of the whole pool.
    pub fn from_records(records: &[AccountRecord]) -> Self {
        let mut keys = HashMap::with_capacity(records.len());
        for record in records {
            let parsed = parse_key(&record.address, &record.private_key);
            if let Err(e) = &parsed {
                warn!("Account {} cannot sign: {}", record.address, e);
            }
            keys.insert(record.address.clone(), parsed);
        }
        Self { keys }
    }
}

fn parse_key(address: &str, private_key: &str) -> Result<PrivateKeySigner, SigningError> {
    let malformed = |reason: String| SigningError::MalformedKey {
        address: address.to_string(),
        reason,
    };
    let bytes = hex::decode(private_key.trim_start_matches("0x")).map_err(|e| malformed(e.to_string()))?;
    let signer = PrivateKeySigner::from_slice(&bytes).map_err(|e| malformed(e.to_string()))?;

    let derived = signer.address().to_checksum(None);
    if !derived.eq_ignore_ascii_case(address) {
        return Err(malformed(format!("key belongs to {derived}")));
    }
    Ok(signer)
}

impl TxSigner for LocalKeySigner {
    fn sign(&self, intent: &TransactionIntent) -> Result<Vec<u8>, SigningError> {
        let signer = match self.keys.get(&intent.sender) {
            Some(Ok(signer)) => signer,
            Some(Err(e)) => return Err(e.clone()),
            None => return Err(SigningError::MissingKey(intent.sender.clone())),
        };
        let to = Address::from_str(&intent.recipient)
            .map_err(|_| SigningError::MalformedRecipient(intent.recipient.clone()))?;

        let tx = TxLegacy {
            chain_id: Some(intent.chain_id),
            nonce: intent.nonce,
            gas_price: intent.gas_price,
            gas_limit: intent.gas_limit,
            to: TxKind::Call(to),
            value: U256::from(intent.value),
            input: Bytes::new(),
        };

        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| SigningError::Signer(e.to_string()))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(envelope.encoded_2718())
    }
}

/// Generate `count` fresh secp256k1 accounts from `rng`.
pub fn generate_accounts<R: RngCore + ?Sized>(count: usize, rng: &mut R) -> Vec<AccountRecord> {
    let mut accounts = Vec::with_capacity(count);
    while accounts.len() < count {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        // Out-of-range scalars are astronomically rare; draw again.
        let Ok(signer) = PrivateKeySigner::from_bytes(&B256::from(secret)) else {
            continue;
        };
        accounts.push(AccountRecord {
            address: signer.address().to_checksum(None),
            private_key: format!("0x{}", hex::encode(secret)),
        });
    }
    accounts
}
