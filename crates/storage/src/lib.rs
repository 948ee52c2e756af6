//! proctrack-storage: the process store and its storage backends.
//!
//! [`ProcessStore`] is the only component that mutates records. It runs the
//! validation layer, stamps timestamps from an injected [`Clock`], and
//! delegates persistence to a [`ProcessStorage`] backend:
//!
//! - [`MemoryStorage`] keeps rows in memory (tests, ephemeral servers)
//! - [`FileStorage`] is the embedded single-table database: one JSON file,
//!   rewritten atomically on every mutation
//!
//! Backends are checked against the shared [`conformance`] suite.
//!
//! [`Clock`]: proctrack_core::Clock

pub mod conformance;
mod error;
mod file;
mod memory;
mod row;
mod store;
mod table;
mod traits;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use row::StoredProcess;
pub use store::{ImportReport, ProcessStore, StoreError, MAX_UPDATE_ATTEMPTS};
pub use traits::ProcessStorage;
