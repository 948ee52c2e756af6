use async_trait::async_trait;
use time::OffsetDateTime;

use proctrack_core::{ListQuery, ProcessFields, ProcessId, ProcessPage};

use crate::error::StorageError;
use crate::row::StoredProcess;

/// The storage trait for process backends.
///
/// A `ProcessStorage` holds one flat table of process rows keyed by id.
/// Backends do not validate: they receive [`ProcessFields`] that already
/// passed the validation layer, and timestamps chosen by the caller.
///
/// ## Durability
///
/// Every mutating method must have durably persisted its effect before it
/// returns `Ok`. A mutation that returns `Err` must leave the table as it
/// was.
///
/// ## Identity
///
/// `insert_process` assigns ids in strictly increasing order. An id is
/// never handed out twice, even after the row holding it is deleted.
///
/// ## OCC Conflict Detection
///
/// `replace_process` is conditional on the row's current version matching
/// `expected_version`. On mismatch it returns
/// `Err(StorageError::ConcurrentConflict { .. })` and changes nothing.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared through
/// axum application state and across async task boundaries.
#[async_trait]
pub trait ProcessStorage: Send + Sync + 'static {
    /// Assign the next id and insert a new row at version 1 with
    /// `created_at = updated_at = now`.
    async fn insert_process(
        &self,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError>;

    /// Read one row.
    ///
    /// Returns `Err(StorageError::NotFound)` if the id does not exist.
    async fn get_process(&self, id: ProcessId) -> Result<StoredProcess, StorageError>;

    /// Filter and paginate rows in insertion (ascending id) order.
    async fn list_processes(&self, query: &ListQuery) -> Result<ProcessPage, StorageError>;

    /// Replace a row's fields if its version equals `expected_version`.
    ///
    /// Keeps `id` and `created_at`, sets `updated_at = now`, recomputes the
    /// derived metrics and bumps the version. Returns the new row.
    async fn replace_process(
        &self,
        id: ProcessId,
        expected_version: u64,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError>;

    /// Permanently remove a row.
    ///
    /// Returns `Err(StorageError::NotFound)` if the id does not exist.
    async fn delete_process(&self, id: ProcessId) -> Result<(), StorageError>;

    /// Stop accepting operations. Later calls return `StorageError::Closed`.
    async fn close(&self) -> Result<(), StorageError>;
}
