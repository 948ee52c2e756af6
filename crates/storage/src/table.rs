//! The single process table shared by every backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use proctrack_core::{ListQuery, ProcessFields, ProcessId, ProcessPage, ProcessRecord};

use crate::error::StorageError;
use crate::row::StoredProcess;

fn first_id() -> ProcessId {
    1
}

/// Rows keyed by id plus the id counter. Ids only grow, so map order is
/// insertion order.
///
/// On disk the rows are a JSON array in id order: `{ "nextId", "rows": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Table {
    #[serde(default = "first_id")]
    next_id: ProcessId,
    #[serde(default, with = "rows_as_list")]
    rows: BTreeMap<ProcessId, StoredProcess>,
}

mod rows_as_list {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use proctrack_core::ProcessId;

    use crate::row::StoredProcess;

    pub(super) fn serialize<S>(
        rows: &BTreeMap<ProcessId, StoredProcess>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(rows.values())
    }

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<ProcessId, StoredProcess>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<StoredProcess>::deserialize(deserializer)?;
        let mut rows = BTreeMap::new();
        for row in list {
            let id = row.record.id;
            if rows.insert(id, row).is_some() {
                return Err(D::Error::custom(format!("duplicate row id {id}")));
            }
        }
        Ok(rows)
    }
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            rows: BTreeMap::new(),
        }
    }
}

impl Table {
    /// Raise the id counter above every stored id.
    ///
    /// A table written by hand or by an older build may carry a stale
    /// counter; ids must still never be reused. Fails when the stored ids
    /// leave no room for another one.
    pub(crate) fn repair_counter(&mut self) -> Result<(), String> {
        if let Some(&max_id) = self.rows.keys().next_back() {
            let after = max_id
                .checked_add(1)
                .ok_or_else(|| format!("row id {max_id} leaves no id for the next insert"))?;
            self.next_id = self.next_id.max(after);
        }
        self.next_id = self.next_id.max(first_id());
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn insert(
        &mut self,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or_else(|| StorageError::Backend("process id space exhausted".to_string()))?;
        let row = StoredProcess {
            version: 1,
            record: ProcessRecord::new(id, fields, now),
        };
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    pub(crate) fn get(&self, id: ProcessId) -> Result<&StoredProcess, StorageError> {
        self.rows.get(&id).ok_or(StorageError::NotFound { id })
    }

    pub(crate) fn list(&self, query: &ListQuery) -> ProcessPage {
        query.apply(self.rows.values().map(|row| &row.record))
    }

    pub(crate) fn replace(
        &mut self,
        id: ProcessId,
        expected_version: u64,
        fields: ProcessFields,
        now: OffsetDateTime,
    ) -> Result<StoredProcess, StorageError> {
        let row = self.rows.get_mut(&id).ok_or(StorageError::NotFound { id })?;
        if row.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                id,
                expected_version,
            });
        }
        row.record = row.record.revise(fields, now);
        row.version += 1;
        Ok(row.clone())
    }

    pub(crate) fn delete(&mut self, id: ProcessId) -> Result<StoredProcess, StorageError> {
        self.rows.remove(&id).ok_or(StorageError::NotFound { id })
    }
}
