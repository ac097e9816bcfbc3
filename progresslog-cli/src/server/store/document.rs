use async_trait::async_trait;
use chrono::Utc;
use progresslog_lib::{LogFilter, NewEntry, ProgressEntry};

use super::{ProgressStore, StoreError};

/// Maximum number of deletes committed in one batch when clearing.
pub const DELETE_BATCH_LIMIT: usize = 450;

const COLLECTION: &str = "progress_entries";

/// Document-collection storage backed by a sled tree.
///
/// Each entry is one JSON document keyed by a monotonically increasing id,
/// so a full scan returns documents in insertion order. Indexed fields are
/// normalized on write and the document is stamped with a server time.
pub struct DocumentStore {
    db: sled::Db,
    collection: sled::Tree,
}

impl DocumentStore {
    pub fn new(db: sled::Db) -> Result<Self, StoreError> {
        let collection = db.open_tree(COLLECTION)?;
        Ok(Self { db, collection })
    }

    /// Open a sled database at the given directory path.
    pub fn open(data_dir: &str) -> Result<Self, StoreError> {
        let db = sled::open(data_dir)?;
        Self::new(db)
    }

    fn next_key(&self) -> Result<[u8; 8], StoreError> {
        Ok(self.db.generate_id()?.to_be_bytes())
    }

    /// Delete one batch of at most `DELETE_BATCH_LIMIT` documents.
    /// Returns how many were deleted, zero once the collection is empty.
    fn delete_batch(&self) -> Result<usize, StoreError> {
        let mut batch = sled::Batch::default();
        let mut count = 0;
        for key in self.collection.iter().keys().take(DELETE_BATCH_LIMIT) {
            batch.remove(key?);
            count += 1;
        }
        if count > 0 {
            self.collection.apply_batch(batch)?;
            self.collection.flush()?;
        }
        Ok(count)
    }
}

#[async_trait]
impl ProgressStore for DocumentStore {
    fn backend(&self) -> &'static str {
        "document"
    }

    async fn add(&self, entry: NewEntry) -> Result<ProgressEntry, StoreError> {
        let doc = entry.normalized().stamped(Utc::now());
        let bytes = serde_json::to_vec(&doc)?;
        let key = self.next_key()?;

        self.collection.insert(key, bytes)?;
        self.collection.flush()?;

        tracing::info!(email = %doc.email, exercise = %doc.exercise, "stored progress document");
        Ok(doc)
    }

    async fn query(&self, filter: &LogFilter) -> Result<Vec<ProgressEntry>, StoreError> {
        let mut docs = Vec::new();
        for item in self.collection.iter().values() {
            let doc: ProgressEntry = serde_json::from_slice(&item?)?;
            if filter.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut total = 0;
        loop {
            let deleted = self.delete_batch()?;
            if deleted == 0 {
                break;
            }
            total += deleted;
            tracing::debug!(deleted, total, "committed delete batch");
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> DocumentStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        DocumentStore::new(db).unwrap()
    }

    fn new_entry(email: &str, student_id: &str, week: &str) -> NewEntry {
        NewEntry {
            email: email.into(),
            student_id: student_id.into(),
            week: week.into(),
            exercise: "Recursion".into(),
            status: "submitted".into(),
            feedback: "Check the base case".into(),
        }
    }

    #[tokio::test]
    async fn test_add_normalizes_and_stamps() {
        let store = temp_store();
        let stored = store
            .add(new_entry(" Ada@Example.com ", " S-9 ", "Week 2"))
            .await
            .unwrap();
        assert_eq!(stored.email, "ada@example.com");
        assert_eq!(stored.student_id, "S-9");
        assert_eq!(stored.week, "week 2");
        assert_eq!(stored.exercise, "Recursion");
        assert!(stored.created_at.is_some());

        let all = store.all().await.unwrap();
        assert_eq!(all, vec![stored]);
    }

    #[tokio::test]
    async fn test_query_and_semantics() {
        let store = temp_store();
        store.add(new_entry("a@b.c", "1", "w1")).await.unwrap();
        store.add(new_entry("a@b.c", "1", "w2")).await.unwrap();
        store.add(new_entry("x@y.z", "2", "w1")).await.unwrap();

        let by_email = LogFilter::new(Some("A@B.C".into()), None, None);
        assert_eq!(store.query(&by_email).await.unwrap().len(), 2);

        let by_email_week = LogFilter::new(Some("a@b.c".into()), None, Some("W2".into()));
        let hits = store.query(&by_email_week).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].week, "w2");

        let by_student = LogFilter::new(None, Some("2".into()), None);
        assert_eq!(store.query(&by_student).await.unwrap()[0].email, "x@y.z");
    }

    #[tokio::test]
    async fn test_scan_returns_insertion_order() {
        let store = temp_store();
        for i in 0..20 {
            store
                .add(new_entry("a@b.c", &i.to_string(), "w1"))
                .await
                .unwrap();
        }
        let ids: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.student_id)
            .collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_clear_spans_multiple_batches() {
        let store = temp_store();
        let n = DELETE_BATCH_LIMIT * 2 + 17;
        for i in 0..n {
            store
                .add(new_entry("a@b.c", &i.to_string(), "w1"))
                .await
                .unwrap();
        }
        assert_eq!(store.clear().await.unwrap(), n);
        assert!(store.all().await.unwrap().is_empty());
        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_batch_is_capped() {
        let store = temp_store();
        for i in 0..(DELETE_BATCH_LIMIT + 5) {
            store
                .add(new_entry("a@b.c", &i.to_string(), "w1"))
                .await
                .unwrap();
        }
        assert_eq!(store.delete_batch().unwrap(), DELETE_BATCH_LIMIT);
        assert_eq!(store.delete_batch().unwrap(), 5);
        assert_eq!(store.delete_batch().unwrap(), 0);
    }
}
