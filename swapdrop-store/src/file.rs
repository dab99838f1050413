//! File-based exchange store with persistence.
//!
//! Every successful write rewrites the snapshot file before returning, so a
//! committed transition survives a restart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::ExchangeStore;
use swapdrop_core::types::{Exchange, ExchangeId};

use crate::MemoryExchangeStore;

/// File format magic bytes
const MAGIC: &[u8; 4] = b"SWPD";
/// Current file format version
const VERSION: u8 = 1;
/// Magic, version, count
const HEADER_LEN: usize = 13;

/// File-based exchange store.
///
/// Serves reads from memory and writes a full snapshot on every change.
///
/// # File Format
///
/// ```text
/// magic (4 bytes): "SWPD"
/// version (1 byte): 1
/// count (8 bytes, LE): number of exchanges
/// exchanges (variable): bincode-serialized Vec<Exchange>
/// ```
pub struct FileExchangeStore {
    path: PathBuf,
    memory: MemoryExchangeStore,
    write_lock: Mutex<()>,
}

impl FileExchangeStore {
    /// Opens the store at `path`, loading it if the file exists.
    ///
    /// The file is created on the first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            memory: MemoryExchangeStore::new(),
            write_lock: Mutex::new(()),
        };

        if fs::try_exists(&store.path).await? {
            store.load().await?;
        }

        Ok(store)
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load(&self) -> Result<()> {
        let contents = fs::read(&self.path).await?;

        if contents.len() < HEADER_LEN {
            return Err(SwapError::StorageError("store file too short".into()));
        }
        if &contents[0..4] != MAGIC {
            return Err(SwapError::StorageError("invalid magic bytes".into()));
        }
        let version = contents[4];
        if version != VERSION {
            return Err(SwapError::VersionMismatch {
                expected: VERSION,
                actual: version,
            });
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&contents[5..HEADER_LEN]);
        let count = u64::from_le_bytes(count_bytes);

        let exchanges: Vec<Exchange> = bincode::deserialize(&contents[HEADER_LEN..])
            .map_err(|e| SwapError::BinarySerializationError(e.to_string()))?;
        if exchanges.len() as u64 != count {
            return Err(SwapError::StorageError(format!(
                "header announces {} exchanges, found {}",
                count,
                exchanges.len()
            )));
        }

        self.memory.import(exchanges);
        info!(count, "exchange store loaded");
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let exchanges = self.memory.all_exchanges();
        let serialized = bincode::serialize(&exchanges)
            .map_err(|e| SwapError::BinarySerializationError(e.to_string()))?;

        let mut contents = Vec::with_capacity(HEADER_LEN + serialized.len());
        contents.extend_from_slice(MAGIC);
        contents.push(VERSION);
        contents.extend_from_slice(&(exchanges.len() as u64).to_le_bytes());
        contents.extend_from_slice(&serialized);

        // Write atomically (write to temp, then rename)
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(count = exchanges.len(), "exchange store persisted");
        Ok(())
    }

    /// Persists, rolling the in-memory record back if the file write fails.
    async fn persist_or_restore(&self, id: &ExchangeId, previous: Option<Exchange>) -> Result<()> {
        if let Err(e) = self.persist().await {
            warn!(exchange_id = %id, error = %e, "persist failed, rolling back");
            self.memory.restore(id, previous);
            return Err(SwapError::StorageError(format!("failed to persist exchange store: {}", e)));
        }
        Ok(())
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of stored exchanges.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}

#[async_trait]
impl ExchangeStore for FileExchangeStore {
    async fn insert_exchange(&self, exchange: Exchange) -> Result<Exchange> {
        let _guard = self.write_lock.lock().await;
        let id = exchange.id.clone();
        let stored = self.memory.insert_exchange(exchange).await?;
        self.persist_or_restore(&id, None).await?;
        Ok(stored)
    }

    async fn load_exchange(&self, id: &ExchangeId) -> Result<Option<Exchange>> {
        self.memory.load_exchange(id).await
    }

    async fn save_exchange(&self, exchange: Exchange) -> Result<Exchange> {
        let _guard = self.write_lock.lock().await;
        let id = exchange.id.clone();
        let previous = self.memory.get(&id);
        let stored = self.memory.save_exchange(exchange).await?;
        self.persist_or_restore(&id, previous).await?;
        Ok(stored)
    }

    async fn list_exchanges(&self) -> Result<Vec<ExchangeId>> {
        self.memory.list_exchanges().await
    }
}
