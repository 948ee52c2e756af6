use serde::{Deserialize, Serialize};

use proctrack_core::ProcessRecord;

/// A record as held by a backend, with its row version.
///
/// The version starts at 1 when the row is inserted and increases by one
/// on every replace. It is storage metadata and never part of the record
/// returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProcess {
    pub version: u64,
    pub record: ProcessRecord,
}
