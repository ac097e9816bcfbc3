use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use progresslog_lib::{LogFilter, NewEntry, ProgressEntry, CSV_HEADERS};
use tokio::sync::Mutex;

use super::{ProgressStore, StoreError};

/// Flat-file storage: one header row followed by one row per entry.
///
/// Entries are stored exactly as submitted. All file access goes through
/// `lock`, so appends and clears from concurrent requests never interleave.
/// File I/O runs on the blocking thread pool.
pub struct CsvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvStore {
    /// Open (creating if needed) the CSV file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };
        ensure_exists(&store.path)?;
        Ok(store)
    }

    /// Run `op` against the file on the blocking pool while holding the lock.
    async fn with_file<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || op(&path)).await?
    }
}

/// Make sure the file exists and starts with the header row. A missing or
/// zero-length file gets a fresh header.
fn ensure_exists(path: &Path) -> Result<(), StoreError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => return Ok(()),
        Ok(_) => {
            write_header(path)?;
            tracing::warn!(path = %path.display(), "CSV file was empty, wrote header");
            return Ok(());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_header(path)?;
    tracing::info!(path = %path.display(), "created new CSV file");
    Ok(())
}

/// Truncate the file down to the header row.
fn write_header(path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(CSV_HEADERS)?;
    writer.flush()?;
    Ok(())
}

fn append(path: &Path, entry: &ProgressEntry) -> Result<(), StoreError> {
    ensure_exists(path)?;
    let file = OpenOptions::new().append(true).open(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(entry.to_record())?;
    writer.flush()?;
    Ok(())
}

fn read_all(path: &Path) -> Result<Vec<ProgressEntry>, StoreError> {
    ensure_exists(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        entries.push(ProgressEntry::from_record(record.iter()));
    }
    Ok(entries)
}

/// Number of data rows. Byte records skip UTF-8 validation.
fn count_rows(path: &Path) -> Result<usize, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut count = 0;
    for record in reader.byte_records() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Truncate to the header regardless of what the file holds. Returns the
/// number of rows removed, or 0 when they could not be counted.
fn truncate(path: &Path) -> Result<usize, StoreError> {
    let removed = match count_rows(path) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "could not count CSV rows before clearing");
            0
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_header(path)?;
    Ok(removed)
}

#[async_trait]
impl ProgressStore for CsvStore {
    fn backend(&self) -> &'static str {
        "csv"
    }

    async fn add(&self, entry: NewEntry) -> Result<ProgressEntry, StoreError> {
        let entry = entry.into_entry();
        let row = entry.clone();
        self.with_file(move |path| append(path, &row)).await?;

        tracing::info!(email = %entry.email, exercise = %entry.exercise, "appended entry to CSV");
        Ok(entry)
    }

    async fn query(&self, filter: &LogFilter) -> Result<Vec<ProgressEntry>, StoreError> {
        let entries = self.with_file(read_all).await?;
        Ok(filter.apply(entries))
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        self.with_file(truncate).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_entry(email: &str, week: &str, exercise: &str) -> NewEntry {
        NewEntry {
            email: email.into(),
            student_id: "S-1".into(),
            week: week.into(),
            exercise: exercise.into(),
            status: "completed".into(),
            feedback: "needs, \"quotes\" and commas".into(),
        }
    }

    #[tokio::test]
    async fn test_open_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.csv");
        let store = CsvStore::open(&path).unwrap();
        let content = fs::read_to_string(&store.path).unwrap();
        assert_eq!(content.trim_end(), "Email,Student ID,Week,Exercise,Status,Feedback");
    }

    #[tokio::test]
    async fn test_open_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        {
            let store = CsvStore::open(&path).unwrap();
            store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();
        }
        let store = CsvStore::open(&path).unwrap();
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_then_read_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();
        store.add(new_entry("x@y.z", "w1", "two")).await.unwrap();
        store.add(new_entry("A@B.C", "W2", "three")).await.unwrap();

        let all = store.all().await.unwrap();
        let exercises: Vec<_> = all.iter().map(|e| e.exercise.as_str()).collect();
        assert_eq!(exercises, ["one", "two", "three"]);
        assert_eq!(all[0].feedback, "needs, \"quotes\" and commas");
        assert!(all[0].created_at.is_none());
        // stored as submitted, not normalized
        assert_eq!(all[2].email, "A@B.C");
    }

    #[tokio::test]
    async fn test_query_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();
        store.add(new_entry("a@b.c", "w2", "two")).await.unwrap();
        store.add(new_entry("x@y.z", "w1", "three")).await.unwrap();

        let filter = LogFilter::new(Some("A@B.C".into()), None, Some("W1".into()));
        let hits = store.query(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].exercise, "one");
    }

    #[tokio::test]
    async fn test_clear_leaves_only_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();
        store.add(new_entry("a@b.c", "w2", "two")).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.all().await.unwrap().is_empty());
        let content = fs::read_to_string(&store.path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_recreates_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        fs::remove_file(&store.path).unwrap();
        assert!(store.all().await.unwrap().is_empty());
        assert!(store.path.exists());
    }

    #[tokio::test]
    async fn test_empty_existing_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, b"").unwrap();

        let store = CsvStore::open(&path).unwrap();
        store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].exercise, "one");
    }

    #[tokio::test]
    async fn test_file_emptied_after_open_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        fs::write(&store.path, b"").unwrap();

        store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_wipes_file_with_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        store.add(new_entry("a@b.c", "w1", "one")).await.unwrap();

        let mut bytes = fs::read(&store.path).unwrap();
        bytes.extend_from_slice(b"x@y.z,2,w1,two,completed,\xff\xfe\n");
        fs::write(&store.path, bytes).unwrap();
        assert!(store.all().await.is_err());

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.all().await.unwrap().is_empty());
        let content = fs::read_to_string(&store.path).unwrap();
        assert_eq!(content.trim_end(), "Email,Student ID,Week,Exercise,Status,Feedback");
    }

    #[tokio::test]
    async fn test_clear_wipes_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("log.csv")).unwrap();
        // malformed quoting plus invalid UTF-8
        fs::write(&store.path, b"Email,Student ID\n\"a@b.c,1\n\xff").unwrap();

        let removed = store.clear().await.unwrap();
        assert!(removed <= 1);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvStore::open(dir.path().join("log.csv")).unwrap());

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .add(new_entry("a@b.c", "w1", &format!("ex-{i}")))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.all().await.unwrap().len(), 32);
    }
}
