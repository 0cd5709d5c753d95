//! Shared setup for the CampusChain binaries.

use crate::blockchain::Ledger;
use crate::config::{Config, StorageBackend, StorageConfig};
use crate::error::{ChainError, Result};
use crate::persistence::{Database, InMemoryPersistence, JsonFileStore, Persistence};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second call (tests, embedded use) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build the persistence adapter selected by `storage`.
pub fn open_persistence(storage: &StorageConfig) -> Result<Box<dyn Persistence>> {
    let persistence: Box<dyn Persistence> = match storage.backend {
        StorageBackend::Json => Box::new(JsonFileStore::new(&storage.path)),
        StorageBackend::Sqlite => {
            if let Some(parent) = std::path::Path::new(&storage.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ChainError::Persistence(format!("Failed to create data dir {:?}: {}", parent, e))
                    })?;
                }
            }
            Box::new(Database::open(&storage.path)?)
        }
        StorageBackend::Memory => Box::new(InMemoryPersistence::new()),
    };
    Ok(persistence)
}

pub fn open_ledger(config: &Config) -> Result<Ledger> {
    let persistence = open_persistence(&config.storage)?;
    let ledger = Ledger::load(persistence)?;
    info!(
        backend = ?config.storage.backend,
        path = %config.storage.path,
        blocks = ledger.len(),
        "ledger ready"
    );
    Ok(ledger)
}
