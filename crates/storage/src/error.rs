use std::path::PathBuf;

use proctrack_core::ProcessId;

/// All errors that can be returned by a ProcessStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No row with the given id.
    #[error("process not found: {id}")]
    NotFound { id: ProcessId },

    /// Optimistic concurrency control conflict: the row was modified after
    /// the caller read it, so its version no longer matches.
    #[error("concurrent conflict on process {id}: expected version {expected_version}")]
    ConcurrentConflict { id: ProcessId, expected_version: u64 },

    /// The backend was closed; no further operations are accepted.
    #[error("storage is closed")]
    Closed,

    /// The table file exists but cannot be decoded.
    #[error("storage file {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Reading or writing the table file failed.
    #[error("storage I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other backend-specific failure (serialization, task join, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}
