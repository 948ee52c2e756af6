//! The embedded single-table database.
//!
//! The whole table lives in one JSON document. Writers hold the table lock,
//! apply the mutation to a copy, write the copy to a temp file in the same
//! directory, fsync it and rename it over the old file. Only then is the
//! copy published in memory, so a failed write leaves both the file and the
//! in-memory table untouched.
//!
//! The write and the publish run in a spawned task that owns the lock
//! guard. Dropping the caller's future cannot stop between the two, so the
//! file and the in-memory table never disagree.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use proctrack_core::{ListQuery, ProcessFields, ProcessId, ProcessPage};

use crate::error::StorageError;
use crate::row::StoredProcess;
use crate::table::Table;
use crate::traits::ProcessStorage;

/// File-backed backend. See the module docs for the write protocol.
#[derive(Debug)]
pub struct FileStorage {
    path: Arc<PathBuf>,
    table: Arc<RwLock<Table>>,
    closed: AtomicBool,
}

impl FileStorage {
    /// Open the table at `path`, creating parent directories as needed.
    ///
    /// A missing or empty file opens as an empty table. The file itself is
    /// not created until the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let dir = parent_dir(&path);
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;

        let table = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Table::default(),
            Ok(bytes) => {
                let mut table: Table =
                    serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                table
                    .repair_counter()
                    .map_err(|reason| StorageError::Corrupt {
                        path: path.clone(),
                        reason,
                    })?;
                table
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Table::default(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        tracing::info!(path = %path.display(), rows = table.len(), "opened process table");
        Ok(Self {
            path: Arc::new(path),
            table: Arc::new(RwLock::new(table)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Apply `op` to a copy of the table, persist the copy, then publish it.
    async fn mutate<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Table) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_open()?;
        let mut table = Arc::clone(&self.table).write_owned().await;
        let path = Arc::clone(&self.path);

        let task = tokio::spawn(async move {
            let mut next = (*table).clone();
            let out = op(&mut next)?;

            let bytes = serde_json::to_vec_pretty(&next)
                .map_err(|e| StorageError::Backend(format!("failed to encode table: {e}")))?;
            tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
                .await
                .map_err(|e| StorageError::Backend(format!("write task failed: {e}")))??;

            *table = next;
            Ok::<T, StorageError>(out)
        });
        task.await
            .map_err(|e| StorageError::Backend(format!("write task failed: {e}")))?
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = parent_dir(path);
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    // The rename is only durable once the directory entry is.
    #[cfg(unix)]
    fs::File::open(&dir)
        .and_then(|d| d.sync_all())
        .map_err(|source| StorageError::Io { path: dir, source })?;

    Ok(())
}

#[async_trait]
impl ProcessStorage for FileStorage {
    async fn insert_process(
        &self,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError> {
        self.mutate(move |table| table.insert(fields, now)).await
    }

    async fn get_process(&self, id: ProcessId) -> Result<StoredProcess, StorageError> {
        self.ensure_open()?;
        self.table.read().await.get(id).cloned()
    }

    async fn list_processes(&self, query: &ListQuery) -> Result<ProcessPage, StorageError> {
        self.ensure_open()?;
        Ok(self.table.read().await.list(query))
    }

    async fn replace_process(
        &self,
        id: ProcessId,
        expected_version: u64,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError> {
        self.mutate(move |table| table.replace(id, expected_version, fields, now))
            .await
    }

    async fn delete_process(&self, id: ProcessId) -> Result<(), StorageError> {
        self.mutate(move |table| table.delete(id).map(|_| ())).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        // Waits for any in-flight write to finish.
        let _table = self.table.write().await;
        self.closed.store(true, Ordering::Release);
        tracing::info!(path = %self.path.display(), "closed process table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use proctrack_core::{Department, Frequency, ProcessStatus};
    use time::macros::datetime;

    fn fields(name: &str) -> ProcessFields {
        ProcessFields {
            email: "clerk@example.com".to_string(),
            department: Department::Ap,
            process_name: name.to_string(),
            description: None,
            apps_used: "ERP".to_string(),
            frequency: Frequency::Daily,
            duration: "00:15".parse().unwrap(),
            volume: 4,
            status: ProcessStatus::Unstructured,
            documentation: None,
        }
    }

    #[tokio::test]
    async fn corrupt_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        fs::write(&path, "{ not json").unwrap();
        let err = FileStorage::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn first_write_creates_file_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("processes.json");
        let storage = FileStorage::open(&path).unwrap();
        assert!(!path.exists());

        storage
            .insert_process(fields("Invoice entry"), datetime!(2024-03-01 09:00 UTC))
            .await
            .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"nextId\": 2"), "{text}");
        assert!(text.contains("Invoice entry"));
    }

    #[tokio::test]
    async fn stale_counter_is_repaired_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        {
            let storage = FileStorage::open(&path).unwrap();
            for name in ["a", "b", "c"] {
                storage
                    .insert_process(fields(name), datetime!(2024-03-01 09:00 UTC))
                    .await
                    .unwrap();
            }
        }
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"nextId\": 4", "\"nextId\": 1")).unwrap();

        let storage = FileStorage::open(&path).unwrap();
        let row = storage
            .insert_process(fields("d"), datetime!(2024-03-02 09:00 UTC))
            .await
            .unwrap();
        assert_eq!(row.record.id, 4);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        let storage = FileStorage::open(&path).unwrap();
        let row = storage
            .insert_process(fields("a"), datetime!(2024-03-01 09:00 UTC))
            .await
            .unwrap();
        let before = fs::read(&path).unwrap();

        let err = storage
            .replace_process(row.record.id, 7, fields("b"), datetime!(2024-03-02 09:00 UTC))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentConflict { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    fn ids_on_disk(path: &Path) -> Vec<ProcessId> {
        let doc: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        doc["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["record"]["id"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn rows_are_stored_as_a_list_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        let storage = FileStorage::open(&path).unwrap();
        for name in ["a", "b", "c"] {
            storage
                .insert_process(fields(name), datetime!(2024-03-01 09:00 UTC))
                .await
                .unwrap();
        }
        storage.delete_process(2).await.unwrap();
        assert_eq!(ids_on_disk(&path), vec![1, 3]);
    }

    #[tokio::test]
    async fn duplicate_row_ids_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .insert_process(fields("a"), datetime!(2024-03-01 09:00 UTC))
                .await
                .unwrap();
        }
        let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let row = doc["rows"][0].clone();
        doc["rows"].as_array_mut().unwrap().push(row);
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let err = FileStorage::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn maximal_row_id_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .insert_process(fields("a"), datetime!(2024-03-01 09:00 UTC))
                .await
                .unwrap();
        }
        let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        doc["rows"][0]["record"]["id"] = serde_json::json!(u64::MAX);
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        match FileStorage::open(&path) {
            Err(StorageError::Corrupt { reason, .. }) => {
                assert!(reason.contains("no id for the next insert"), "{reason}")
            }
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_insert_still_publishes_what_it_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processes.json");
        let storage = FileStorage::open(&path).unwrap();
        storage
            .insert_process(fields("seed"), datetime!(2024-03-01 09:00 UTC))
            .await
            .unwrap();

        // Some of these inserts are dropped mid-write.
        for micros in 0..200 {
            let _ = tokio::time::timeout(
                Duration::from_micros(micros),
                storage.insert_process(fields("dropped"), datetime!(2024-03-01 09:00 UTC)),
            )
            .await;
        }

        let page = storage.list_processes(&ListQuery::default()).await.unwrap();
        let in_memory: Vec<ProcessId> = page.processes.iter().map(|r| r.id).collect();
        let on_disk = ids_on_disk(&path);
        assert_eq!(in_memory, on_disk);

        let next = storage
            .insert_process(fields("next"), datetime!(2024-03-02 09:00 UTC))
            .await
            .unwrap();
        assert!(on_disk.iter().all(|&id| id < next.record.id));
        let after = ids_on_disk(&path);
        assert_eq!(after.len(), on_disk.len() + 1);
        assert_eq!(after[..on_disk.len()], on_disk[..]);
    }
}
