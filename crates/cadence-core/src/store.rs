use crate::accounts::AccountRecord;
use crate::error::{BenchError, StoreError};
use crate::signer::generate_accounts;
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persistence for test accounts. Used only at phase boundaries.
pub trait AccountStore: Send + Sync {
    fn load(&self) -> Result<Vec<AccountRecord>, StoreError>;

    fn save(&self, accounts: &[AccountRecord]) -> Result<(), StoreError>;
}

/// JSON array of `{address, private_key}` objects on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl AccountStore for JsonFileStore {
    fn load(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.display(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Json {
            path: self.display(),
            source,
        })
    }

    fn save(&self, accounts: &[AccountRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(accounts).map_err(|source| StoreError::Json {
            path: self.display(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.display(),
            source,
        })
    }
}

/// Load stored accounts, or generate `generate_count` throwaway ones when
/// the store has nothing yet. Generated accounts are not saved.
pub fn load_or_generate<R: RngCore + ?Sized>(
    store: &dyn AccountStore,
    generate_count: usize,
    rng: &mut R,
) -> Result<Vec<AccountRecord>, BenchError> {
    match store.load() {
        Ok(accounts) => {
            info!("Loaded {} accounts", accounts.len());
            Ok(accounts)
        }
        Err(e) if e.is_not_found() => {
            warn!(
                "No account file; generating {} unfunded accounts, submissions will likely be rejected",
                generate_count
            );
            Ok(generate_accounts(generate_count, rng))
        }
        Err(e) => Err(e.into()),
    }
}
