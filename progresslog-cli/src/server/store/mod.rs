pub mod csv_file;
pub mod document;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use progresslog_lib::{LogFilter, NewEntry, ProgressEntry};
use thiserror::Error;

use super::config::{ServerConfig, StorageBackend};

pub use self::csv_file::CsvStore;
pub use self::document::DocumentStore;
pub use self::memory::MemoryStore;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("document store error: {0}")]
    Sled(#[from] sled::Error),
    #[error("failed to (de)serialize document: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Storage for progress entries. Implementations must be thread-safe.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Short backend name, reported by the healthcheck and metrics.
    fn backend(&self) -> &'static str;

    /// Persist a validated entry and return it as stored.
    async fn add(&self, entry: NewEntry) -> Result<ProgressEntry, StoreError>;

    /// Entries matching every present filter, in insertion order.
    async fn query(&self, filter: &LogFilter) -> Result<Vec<ProgressEntry>, StoreError>;

    /// Every stored entry.
    async fn all(&self) -> Result<Vec<ProgressEntry>, StoreError> {
        self.query(&LogFilter::default()).await
    }

    /// Remove every entry and return how many were removed.
    async fn clear(&self) -> Result<usize, StoreError>;
}

/// Open the backend selected in the configuration.
pub fn open_store(config: &ServerConfig) -> Result<Arc<dyn ProgressStore>, StoreError> {
    let store: Arc<dyn ProgressStore> = match config.storage {
        StorageBackend::Csv => Arc::new(CsvStore::open(&config.csv_file)?),
        StorageBackend::Document => Arc::new(DocumentStore::open(&config.data_dir)?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
