use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use proctrack_core::{ListQuery, ProcessFields, ProcessId, ProcessPage};

use crate::error::StorageError;
use crate::row::StoredProcess;
use crate::table::Table;
use crate::traits::ProcessStorage;

/// In-memory backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    table: RwLock<Table>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProcessStorage for MemoryStorage {
    async fn insert_process(
        &self,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError> {
        self.ensure_open()?;
        self.table.write().await.insert(fields, now)
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
        self.ensure_open()?;
        self.table
            .write()
            .await
            .replace(id, expected_version, fields, now)
    }

    async fn delete_process(&self, id: ProcessId) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.table.write().await.delete(id).map(|_| ())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
