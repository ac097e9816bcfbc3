use async_trait::async_trait;
use chrono::Utc;
use progresslog_lib::{LogFilter, NewEntry, ProgressEntry};
use tokio::sync::RwLock;

use super::{ProgressStore, StoreError};

/// In-memory storage backed by a `RwLock<Vec>`. Normalizes like the
/// document store.
pub struct MemoryStore {
    entries: RwLock<Vec<ProgressEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn add(&self, entry: NewEntry) -> Result<ProgressEntry, StoreError> {
        let entry = entry.normalized().stamped(Utc::now());
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn query(&self, filter: &LogFilter) -> Result<Vec<ProgressEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}
