use crate::blockchain::core::validation::{audit_chain, check_block_hash, verify_chain, ChainFault, VerifyReport};
use crate::crypto::block_digest;
use crate::error::{ChainError, Result};
use crate::events::LedgerEvent;
use crate::persistence::{InMemoryPersistence, Persistence};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// `prev_hash` of the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";
/// Payload of the genesis block.
pub const GENESIS_PAYLOAD: &str = "genesis";

/// One immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the Unix epoch at creation time.
    pub timestamp: i64,
    #[serde(alias = "previousHash")]
    pub prev_hash: String,
    /// Opaque, caller-serialized event description.
    #[serde(alias = "data")]
    pub payload: String,
    pub hash: String,
}

impl Block {
    /// Build a block and seal it with its digest.
    pub fn new(index: u64, timestamp: i64, prev_hash: String, payload: String) -> Self {
        let hash = block_digest(index, timestamp, &prev_hash, &payload);
        Block {
            index,
            timestamp,
            prev_hash,
            payload,
            hash,
        }
    }

    pub fn genesis(timestamp: i64) -> Self {
        Block::new(0, timestamp, GENESIS_PREV_HASH.to_string(), GENESIS_PAYLOAD.to_string())
    }

    /// Recompute the digest from the stored fields.
    pub fn calculate_hash(&self) -> String {
        block_digest(self.index, self.timestamp, &self.prev_hash, &self.payload)
    }

    pub fn reference(&self) -> BlockRef {
        BlockRef {
            index: self.index,
            hash: self.hash.clone(),
        }
    }
}

/// Returned by `append`: proof that a block was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub index: u64,
    pub hash: String,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Append-only, hash-linked sequence of blocks backed by a [`Persistence`]
/// adapter.
///
/// `append` is serialized per instance through the upgradable read lock:
/// only one appender can hold it, plain readers are not blocked, and the new
/// block becomes visible only after the store has accepted it.
pub struct Ledger {
    blocks: RwLock<Vec<Block>>,
    persistence: Box<dyn Persistence>,
}

impl Ledger {
    /// Load the persisted chain, creating and persisting a genesis block if
    /// none exists. An existing chain is taken verbatim; call [`Ledger::verify`]
    /// to check it.
    pub fn load(persistence: Box<dyn Persistence>) -> Result<Self> {
        let blocks = match persistence.load_chain() {
            Ok(blocks) if !blocks.is_empty() => {
                debug!(blocks = blocks.len(), "loaded persisted chain");
                blocks
            }
            Ok(_) | Err(ChainError::NotFound) => {
                let genesis = Block::genesis(now());
                let chain = vec![genesis];
                persistence.save_chain(&chain).map_err(|e| {
                    error!(error = %e, "failed to persist genesis block");
                    e
                })?;
                info!(hash = %chain[0].hash, "created genesis block");
                chain
            }
            Err(e) => {
                error!(error = %e, "failed to load chain");
                return Err(e);
            }
        };

        Ok(Ledger {
            blocks: RwLock::new(blocks),
            persistence,
        })
    }

    /// Create a ledger over a fresh in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::load(Box::new(InMemoryPersistence::new()))
    }

    /// Append `payload` as a new block and return its reference once the
    /// store has durably accepted it.
    pub fn append(&self, payload: impl Into<String>) -> Result<BlockRef> {
        let payload = payload.into();
        let chain = self.blocks.upgradable_read();

        let tail = chain.last().ok_or_else(|| ChainError::CorruptChain {
            index: 0,
            reason: "ledger holds no blocks".to_string(),
        })?;

        if let Some(fault) = check_block_hash(tail) {
            warn!(index = tail.index, "refusing to append to corrupt chain");
            return Err(ChainError::CorruptChain {
                index: fault.index,
                reason: fault.kind.to_string(),
            });
        }

        let index = tail.index.checked_add(1).ok_or_else(|| ChainError::CorruptChain {
            index: tail.index,
            reason: "block index overflow".to_string(),
        })?;
        let block = Block::new(index, now(), tail.hash.clone(), payload);

        self.persistence.append_block(&chain, &block).map_err(|e| {
            error!(index = block.index, error = %e, "failed to persist block");
            e
        })?;

        let reference = block.reference();
        let mut chain = RwLockUpgradableReadGuard::upgrade(chain);
        chain.push(block);
        info!(index = reference.index, hash = %reference.hash, "appended block");

        Ok(reference)
    }

    /// Serialize `event` and append it.
    pub fn append_event(&self, event: &LedgerEvent) -> Result<BlockRef> {
        self.append(event.to_payload()?)
    }

    /// Full dump of the chain, oldest first.
    pub fn get_chain(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        let chain = self.blocks.read();
        usize::try_from(index).ok().and_then(|i| chain.get(i).cloned())
    }

    pub fn tail(&self) -> Option<Block> {
        self.blocks.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Check linkage and hash recomputation, stopping at the first failure.
    pub fn verify(&self) -> VerifyReport {
        let report = verify_chain(&self.blocks.read());
        if let Some(index) = report.first_invalid_index {
            warn!(index, "chain verification failed");
        }
        report
    }

    /// Every fault in the chain, not only the first.
    pub fn audit(&self) -> Vec<ChainFault> {
        audit_chain(&self.blocks.read())
    }

    /// Write the current chain back to the store in full.
    pub fn save(&self) -> Result<()> {
        let chain = self.blocks.read();
        self.persistence.save_chain(&chain)
    }

    pub fn supports_cross_process_locking(&self) -> bool {
        self.persistence.supports_cross_process_locking()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").field("blocks", &self.len()).finish()
    }
}
