use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// A stored test account: address plus hex-encoded private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub address: String,
    pub private_key: String,
}

#[derive(Debug)]
struct Slot {
    address: String,
    nonce: AtomicU64,
}

/// Sender identities and their nonce counters.
///
/// Every address owns its own atomic counter, so reservations on different
/// accounts never contend and reservations on the same account are
/// serialized by the read-modify-write on that counter.
#[derive(Debug)]
pub struct AccountPool {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
}

impl AccountPool {
    /// Build a pool with every nonce at zero. Duplicate addresses are dropped.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots = Vec::new();
        let mut index = HashMap::new();
        for address in addresses {
            let address = address.into();
            if index.contains_key(&address) {
                warn!("Ignoring duplicate account {}", address);
                continue;
            }
            index.insert(address.clone(), slots.len());
            slots.push(Slot {
                address,
                nonce: AtomicU64::new(0),
            });
        }
        Self { slots, index }
    }

    pub fn from_records(records: &[AccountRecord]) -> Self {
        Self::new(records.iter().map(|r| r.address.clone()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn address(&self, idx: usize) -> &str {
        &self.slots[idx].address
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.address.as_str())
    }

    /// Set the starting nonce for `address`, normally from a live
    /// pending-transaction-count query before the load phase.
    pub fn seed(&self, address: &str, initial_nonce: u64) -> Result<(), BenchError> {
        let slot = self.slot(address)?;
        slot.nonce.store(initial_nonce, Ordering::SeqCst);
        Ok(())
    }

    /// Atomically return the current nonce for `address` and advance it by `count`.
    pub fn reserve(&self, address: &str, count: u64) -> Result<u64, BenchError> {
        let slot = self.slot(address)?;
        Ok(slot.nonce.fetch_add(count, Ordering::SeqCst))
    }

    /// Same as [`reserve`](Self::reserve) for an index already known to be in range.
    pub fn reserve_at(&self, idx: usize, count: u64) -> u64 {
        self.slots[idx].nonce.fetch_add(count, Ordering::SeqCst)
    }

    /// Next nonce that would be handed out for `address`.
    pub fn nonce(&self, address: &str) -> Result<u64, BenchError> {
        Ok(self.slot(address)?.nonce.load(Ordering::SeqCst))
    }

    fn slot(&self, address: &str) -> Result<&Slot, BenchError> {
        self.index
            .get(address)
            .map(|&idx| &self.slots[idx])
            .ok_or_else(|| BenchError::UnknownAccount(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_reserve_advances_nonce() {
        let pool = AccountPool::new(["0xaa", "0xbb"]);
        pool.seed("0xaa", 7).unwrap();

        assert_eq!(pool.reserve("0xaa", 5).unwrap(), 7);
        assert_eq!(pool.reserve("0xaa", 3).unwrap(), 12);
        assert_eq!(pool.nonce("0xaa").unwrap(), 15);
        assert_eq!(pool.reserve("0xbb", 1).unwrap(), 0);
    }

    #[test]
    fn test_unknown_account() {
        let pool = AccountPool::new(["0xaa"]);
        assert!(matches!(
            pool.reserve("0xcc", 1),
            Err(BenchError::UnknownAccount(a)) if a == "0xcc"
        ));
        assert!(matches!(
            pool.seed("0xcc", 1),
            Err(BenchError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_duplicate_addresses_collapse() {
        let pool = AccountPool::new(["0xaa", "0xbb", "0xaa"]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.addresses().collect::<Vec<_>>(), vec!["0xaa", "0xbb"]);
    }

    #[test]
    fn test_concurrent_reservations_are_disjoint_and_contiguous() {
        let pool = AccountPool::new(["0xaa"]);
        pool.seed("0xaa", 100).unwrap();
        let ranges = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for t in 0..8u64 {
                let pool = &pool;
                let ranges = &ranges;
                s.spawn(move || {
                    for i in 0..200u64 {
                        let count = 1 + (t + i) % 7;
                        let start = pool.reserve("0xaa", count).unwrap();
                        ranges.lock().unwrap().push((start, count));
                    }
                });
            }
        });

        let mut ranges = ranges.into_inner().unwrap();
        ranges.sort();
        let total: u64 = ranges.iter().map(|(_, c)| c).sum();

        let mut expected = 100;
        for (start, count) in &ranges {
            assert_eq!(*start, expected, "gap or overlap at {}", start);
            expected += count;
        }
        assert_eq!(expected, 100 + total);
        assert_eq!(pool.nonce("0xaa").unwrap(), 100 + total);
    }
}
