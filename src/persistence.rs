//! Persistence adapters for the CampusChain ledger

use crate::blockchain::Block;
use crate::error::{ChainError, Result};
use rusqlite::{params, Connection};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::debug;

/// Storage contract consumed by the ledger.
///
/// Implementations must make every successful write durable before
/// returning, and a failed write must leave the previously stored chain
/// intact. The ledger serializes its own appends; whether two processes can
/// share one store safely is reported by
/// [`Persistence::supports_cross_process_locking`].
pub trait Persistence: Send + Sync {
    /// Read the whole chain, oldest first. `Err(ChainError::NotFound)` when
    /// nothing has been stored yet.
    fn load_chain(&self) -> Result<Vec<Block>>;

    /// Replace the stored chain.
    fn save_chain(&self, blocks: &[Block]) -> Result<()>;

    /// Store `block` as the successor of `chain`, which is the chain as
    /// currently persisted.
    fn append_block(&self, chain: &[Block], block: &Block) -> Result<()> {
        let mut blocks = Vec::with_capacity(chain.len() + 1);
        blocks.extend_from_slice(chain);
        blocks.push(block.clone());
        self.save_chain(&blocks)
    }

    /// Whether the backend itself stops a second process from writing a
    /// conflicting block.
    fn supports_cross_process_locking(&self) -> bool {
        false
    }
}

// ============================================================================
// SQLite
// ============================================================================

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::Persistence(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blockchain (
                idx INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                prev_hash TEXT NOT NULL,
                data TEXT NOT NULL,
                hash TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::Persistence(format!("Failed to create blockchain table: {}", e)))?;

        Ok(Database { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChainError::Persistence("Mutex poisoned".to_string()))
    }

    fn insert_block(conn: &Connection, block: &Block) -> Result<()> {
        let index = i64::try_from(block.index)
            .map_err(|_| ChainError::Persistence(format!("Block index {} out of range", block.index)))?;
        conn.execute(
            "INSERT INTO blockchain (idx, timestamp, prev_hash, data, hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![index, block.timestamp, block.prev_hash, block.payload, block.hash],
        )
        .map_err(|e| ChainError::Persistence(format!("Failed to save block {}: {}", block.index, e)))?;
        Ok(())
    }

    pub fn load_chain(&self) -> Result<Vec<Block>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT idx, timestamp, prev_hash, data, hash FROM blockchain ORDER BY idx ASC")
            .map_err(|e| ChainError::Persistence(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let index: i64 = row.get(0)?;
                let index = u64::try_from(index).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Integer, Box::new(e))
                })?;
                Ok(Block {
                    index,
                    timestamp: row.get(1)?,
                    prev_hash: row.get(2)?,
                    payload: row.get(3)?,
                    hash: row.get(4)?,
                })
            })
            .map_err(|e| ChainError::Persistence(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row.map_err(|e| ChainError::Persistence(format!("Failed to load block: {}", e)))?);
        }

        if blocks.is_empty() {
            return Err(ChainError::NotFound);
        }
        debug!(blocks = blocks.len(), "loaded chain from sqlite");
        Ok(blocks)
    }

    /// Replace the table contents in a single transaction.
    pub fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| ChainError::Persistence(format!("Failed to start transaction: {}", e)))?;

        tx.execute("DELETE FROM blockchain", [])
            .map_err(|e| ChainError::Persistence(format!("Failed to clear blockchain: {}", e)))?;
        for block in blocks {
            Self::insert_block(&tx, block)?;
        }

        tx.commit()
            .map_err(|e| ChainError::Persistence(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    /// Insert one row. A block whose index is already taken is rejected by
    /// the primary key.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let conn = self.lock()?;
        Self::insert_block(&conn, block)
    }
}

impl Persistence for Database {
    fn load_chain(&self) -> Result<Vec<Block>> {
        Database::load_chain(self)
    }

    fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        Database::save_chain(self, blocks)
    }

    fn append_block(&self, _chain: &[Block], block: &Block) -> Result<()> {
        Database::append_block(self, block)
    }

    fn supports_cross_process_locking(&self) -> bool {
        true
    }
}

// ============================================================================
// Flat JSON file
// ============================================================================

/// Whole chain stored as a JSON array in one file.
///
/// Every save writes a temporary sibling file, syncs it, and renames it over
/// the target, so readers see either the old chain or the new one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl Persistence for JsonFileStore {
    fn load_chain(&self) -> Result<Vec<Block>> {
        if !self.path.exists() {
            return Err(ChainError::NotFound);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            ChainError::Persistence(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let blocks: Vec<Block> = serde_json::from_str(&raw).map_err(|e| {
            ChainError::Persistence(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), blocks = blocks.len(), "loaded chain file");
        Ok(blocks)
    }

    fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| {
            ChainError::Persistence(format!("Failed to create data dir {}: {}", dir.display(), e))
        })?;

        let io_err = |e: std::io::Error| {
            ChainError::Persistence(format!("Failed to write {}: {}", self.path.display(), e))
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut tmp, blocks)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        sync_dir(dir).map_err(io_err)?;
        Ok(())
    }
}

/// Flush the directory entry so a completed rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub blocks: Arc<Mutex<Option<Vec<Block>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing chain.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Arc::new(Mutex::new(Some(blocks))),
        }
    }
}

impl Persistence for InMemoryPersistence {
    fn load_chain(&self) -> Result<Vec<Block>> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::Persistence("Mutex poisoned".to_string()))?;
        blocks.clone().ok_or(ChainError::NotFound)
    }

    fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        let mut stored = self
            .blocks
            .lock()
            .map_err(|_| ChainError::Persistence("Mutex poisoned".to_string()))?;
        *stored = Some(blocks.to_vec());
        Ok(())
    }

    fn append_block(&self, _chain: &[Block], block: &Block) -> Result<()> {
        let mut stored = self
            .blocks
            .lock()
            .map_err(|_| ChainError::Persistence("Mutex poisoned".to_string()))?;
        stored.get_or_insert_with(Vec::new).push(block.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_chain() -> Vec<Block> {
        let genesis = Block::genesis(1_700_000_000);
        let first = Block::new(1, 1_700_000_001, genesis.hash.clone(), "A".to_string());
        vec![genesis, first]
    }

    #[test]
    fn test_database_open() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_database_empty_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_chain(), Err(ChainError::NotFound));
    }

    #[test]
    fn test_database_save_and_load_chain() {
        let db = Database::open_in_memory().unwrap();
        let chain = sample_chain();
        db.save_chain(&chain).unwrap();
        assert_eq!(db.load_chain().unwrap(), chain);

        // Saving again replaces rather than duplicating rows.
        db.save_chain(&chain[..1]).unwrap();
        assert_eq!(db.load_chain().unwrap(), chain[..1].to_vec());
    }

    #[test]
    fn test_database_rejects_duplicate_index() {
        let db = Database::open_in_memory().unwrap();
        let chain = sample_chain();
        db.save_chain(&chain).unwrap();

        let fork = Block::new(1, 1_700_000_002, chain[0].hash.clone(), "B".to_string());
        let err = Persistence::append_block(&db, &chain[..1], &fork).unwrap_err();
        assert!(matches!(err, ChainError::Persistence(_)));
        assert_eq!(db.load_chain().unwrap(), chain);
        assert!(db.supports_cross_process_locking());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("chain.json"));
        assert_eq!(store.load_chain(), Err(ChainError::NotFound));

        let chain = sample_chain();
        store.save_chain(&chain).unwrap();
        assert_eq!(store.load_chain().unwrap(), chain);
        assert!(!store.supports_cross_process_locking());
    }

    #[test]
    fn test_json_file_default_append_rewrites_chain() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("chain.json"));
        let chain = sample_chain();
        store.save_chain(&chain[..1]).unwrap();

        store.append_block(&chain[..1], &chain[1]).unwrap();
        assert_eq!(store.load_chain().unwrap(), chain);
    }

    #[test]
    fn test_json_file_reads_legacy_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(
            &path,
            r#"[{"index":0,"timestamp":1700000000,"previousHash":"0","data":"genesis","hash":"0"}]"#,
        )
        .unwrap();

        let blocks = JsonFileStore::new(&path).load_chain().unwrap();
        assert_eq!(blocks[0].prev_hash, "0");
        assert_eq!(blocks[0].payload, "genesis");
    }

    #[test]
    fn test_json_file_garbage_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, "not json").unwrap();

        let err = JsonFileStore::new(&path).load_chain().unwrap_err();
        assert!(matches!(err, ChainError::Persistence(_)));
    }

    #[test]
    fn test_database_negative_index_is_persistence_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO blockchain (idx, timestamp, prev_hash, data, hash) VALUES (-1, 0, '0', 'x', 'h')",
                [],
            )
            .unwrap();

        let err = db.load_chain().unwrap_err();
        assert!(matches!(err, ChainError::Persistence(_)));
    }

    #[test]
    fn test_json_file_save_syncs_parent_dir() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("chain.json"));
        store.save_chain(&sample_chain()).unwrap();
        sync_dir(dir.path()).unwrap();
        assert_eq!(store.load_chain().unwrap(), sample_chain());
    }

    #[test]
    fn test_in_memory_clones_share_storage() {
        let store = InMemoryPersistence::new();
        let other = store.clone();
        assert_eq!(store.load_chain(), Err(ChainError::NotFound));

        store.save_chain(&sample_chain()).unwrap();
        assert_eq!(other.load_chain().unwrap().len(), 2);
    }
}
