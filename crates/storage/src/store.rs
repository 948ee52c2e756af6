//! The process store: validation, timestamps and conflict retry on top of
//! a storage backend.

use std::sync::Arc;

use serde::Serialize;

use proctrack_core::{
    parse_process_csv, validate, Clock, CsvError, ListQuery, ProcessId, ProcessInput, ProcessPage,
    ProcessRecord, SystemClock, ValidationError, ValidationRules,
};

use crate::error::StorageError;
use crate::traits::ProcessStorage;

/// How many read-merge-write cycles an update attempts before giving up.
pub const MAX_UPDATE_ATTEMPTS: usize = 16;

/// Errors returned by [`ProcessStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("process {0} not found")]
    NotFound(ProcessId),

    /// Every update attempt lost a race with another writer.
    #[error("process {id} kept changing during update; gave up after {attempts} attempts")]
    Conflict { id: ProcessId, attempts: usize },

    /// The CSV document as a whole could not be read.
    #[error("invalid CSV: {0}")]
    Import(#[from] CsvError),

    /// The backend failed. Never retried.
    #[error("storage fault: {0}")]
    Fault(StorageError),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => StoreError::NotFound(id),
            other => StoreError::Fault(other),
        }
    }
}

/// Outcome of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success_count: usize,
    pub error_count: usize,
    /// One `Row N: reason` entry per rejected row, where N is the line the
    /// row starts on.
    pub errors: Vec<String>,
    /// Ids of the created records, in row order.
    pub created: Vec<ProcessId>,
}

/// Owner of the authoritative process records.
#[derive(Clone)]
pub struct ProcessStore {
    storage: Arc<dyn ProcessStorage>,
    clock: Arc<dyn Clock>,
    rules: ValidationRules,
}

impl ProcessStore {
    /// A store over `storage` using the system clock and default rules.
    pub fn new(storage: Arc<dyn ProcessStorage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            rules: ValidationRules::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub async fn list(&self, query: &ListQuery) -> Result<ProcessPage, StoreError> {
        Ok(self.storage.list_processes(query).await?)
    }

    pub async fn get(&self, id: ProcessId) -> Result<ProcessRecord, StoreError> {
        Ok(self.storage.get_process(id).await?.record)
    }

    pub async fn create(&self, input: ProcessInput) -> Result<ProcessRecord, StoreError> {
        let fields = validate(&input, &self.rules)?;
        let row = self.storage.insert_process(fields, self.clock.now()).await?;
        tracing::info!(id = row.record.id, name = %row.record.fields.process_name, "created process");
        Ok(row.record)
    }

    /// Apply a partial update.
    ///
    /// The patch is merged over the current record and the merged result
    /// validated as a whole. The write is conditional on the version that
    /// was read; if another writer got there first the merge is redone from
    /// the fresh record.
    pub async fn update(&self, id: ProcessId, patch: ProcessInput) -> Result<ProcessRecord, StoreError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.storage.get_process(id).await?;
            let merged = current.record.fields.to_input().overlay(patch.clone());
            let fields = validate(&merged, &self.rules)?;

            match self
                .storage
                .replace_process(id, current.version, fields, self.clock.now())
                .await
            {
                Ok(row) => {
                    tracing::info!(
                        id,
                        version = row.version,
                        fields = ?patch.supplied_fields(),
                        "updated process"
                    );
                    return Ok(row.record);
                }
                Err(StorageError::ConcurrentConflict { .. }) => {
                    tracing::warn!(id, attempt, "update raced another writer; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::Conflict {
            id,
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    pub async fn delete(&self, id: ProcessId) -> Result<(), StoreError> {
        self.storage.delete_process(id).await?;
        tracing::info!(id, "deleted process");
        Ok(())
    }

    /// Create one record per valid CSV row.
    ///
    /// Rows that fail to parse or validate are counted and reported; they
    /// never stop the import. A header problem rejects the whole document
    /// before anything is written. A storage fault stops the import, and
    /// rows created before it remain.
    pub async fn import_csv(&self, text: &str) -> Result<ImportReport, StoreError> {
        let rows = parse_process_csv(text)?;
        let mut report = ImportReport::default();

        for row in rows {
            let outcome = match row.input {
                Ok(input) => self.create(input).await,
                Err(reason) => Err(StoreError::Validation(ValidationError::single("row", &reason))),
            };
            match outcome {
                Ok(record) => {
                    report.success_count += 1;
                    report.created.push(record.id);
                }
                Err(StoreError::Validation(err)) => {
                    report.error_count += 1;
                    report.errors.push(format!("Row {}: {}", row.line, row_reason(&err)));
                }
                Err(other) => return Err(other),
            }
        }

        tracing::info!(
            successes = report.success_count,
            errors = report.error_count,
            "CSV import completed"
        );
        Ok(report)
    }

    /// Close the backend. Later operations fail with a storage fault.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.storage.close().await.map_err(StoreError::Fault)
    }
}

fn row_reason(err: &ValidationError) -> String {
    err.violations
        .iter()
        .map(|v| {
            if v.field == "row" {
                v.reason.clone()
            } else {
                format!("{} {}", v.field, v.reason)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use proctrack_core::{Department, FixedClock, Frequency, ProcessStatus};
    use time::macros::datetime;
    use time::Duration;

    fn input(name: &str) -> ProcessInput {
        ProcessInput {
            email: Some("clerk@example.com".to_string()),
            department: Some("AP".to_string()),
            process_name: Some(name.to_string()),
            description: Some(Some("Key supplier invoices into the ERP".to_string())),
            apps_used: Some("ERP, Excel".to_string()),
            frequency: Some("DAILY".to_string()),
            duration: Some("00:30".to_string()),
            volume: Some(10),
            status: Some("UNSTRUCTURED".to_string()),
            documentation: None,
        }
    }

    fn store() -> (ProcessStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 08:00 UTC)));
        let store = ProcessStore::new(Arc::new(MemoryStorage::new())).with_clock(clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn create_then_get_returns_input_with_identity() {
        let (store, _) = store();
        let created = store.create(input("Invoice entry")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.created_at, datetime!(2024-05-01 08:00 UTC));
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.fields.to_input(), input("Invoice entry"));
        // 10 * 220 runs of 30 minutes.
        assert_eq!(created.yearly_volume, 2200);
        assert_eq!(created.yearly_duration, "1100:00");

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_rejects_invalid_department() {
        let (store, _) = store();
        let mut bad = input("Invoice entry");
        bad.department = Some("XX".to_string());
        let err = store.create(bad).await.unwrap_err();
        match err {
            StoreError::Validation(v) => assert!(v.names_field("department")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.list(&ListQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn update_changes_only_supplied_field() {
        let (store, clock) = store();
        let created = store.create(input("Invoice entry")).await.unwrap();
        clock.advance(Duration::hours(1));

        let patch = ProcessInput {
            frequency: Some("WEEKLY".to_string()),
            ..ProcessInput::default()
        };
        let updated = store.update(created.id, patch).await.unwrap();

        assert_eq!(updated.fields.frequency, Frequency::Weekly);
        assert_eq!(updated.fields.department, Department::Ap);
        assert_eq!(updated.fields.process_name, created.fields.process_name);
        assert_eq!(updated.fields.description, created.fields.description);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, datetime!(2024-05-01 09:00 UTC));
        assert_eq!(updated.yearly_volume, 480);
        assert_eq!(updated.yearly_duration, "240:00");
    }

    #[tokio::test]
    async fn update_with_null_clears_optional_field() {
        let (store, _) = store();
        let created = store.create(input("Invoice entry")).await.unwrap();
        assert!(created.fields.description.is_some());

        let patch = ProcessInput {
            description: Some(None),
            ..ProcessInput::default()
        };
        let updated = store.update(created.id, patch).await.unwrap();
        assert_eq!(updated.fields.description, None);
        assert_eq!(updated.fields.process_name, created.fields.process_name);

        let kept = store.update(created.id, ProcessInput::default()).await.unwrap();
        assert_eq!(kept.fields.description, None);
    }

    #[tokio::test]
    async fn update_validates_merged_record() {
        let (store, _) = store();
        let created = store.create(input("Invoice entry")).await.unwrap();
        let patch = ProcessInput {
            duration: Some("25:99".to_string()),
            ..ProcessInput::default()
        };
        let err = store.update(created.id, patch).await.unwrap_err();
        assert!(matches!(&err, StoreError::Validation(v) if v.names_field("duration")));
        assert_eq!(store.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let (store, _) = store();
        assert!(matches!(store.get(9).await, Err(StoreError::NotFound(9))));
        assert!(matches!(
            store.update(9, ProcessInput::default()).await,
            Err(StoreError::NotFound(9))
        ));
        assert!(matches!(store.delete(9).await, Err(StoreError::NotFound(9))));
    }

    #[tokio::test]
    async fn delete_is_permanent_and_ids_are_not_reused() {
        let (store, _) = store();
        let first = store.create(input("One")).await.unwrap();
        store.delete(first.id).await.unwrap();
        assert!(matches!(store.get(first.id).await, Err(StoreError::NotFound(_))));

        let second = store.create(input("Two")).await.unwrap();
        assert_eq!(second.id, first.id + 1);
    }

    #[tokio::test]
    async fn list_returns_insertion_order() {
        let (store, _) = store();
        for name in ["R1", "R2", "R3"] {
            store.create(input(name)).await.unwrap();
        }
        let page = store.list(&ListQuery::default()).await.unwrap();
        let names: Vec<_> = page
            .processes
            .iter()
            .map(|r| r.fields.process_name.as_str())
            .collect();
        assert_eq!(names, vec!["R1", "R2", "R3"]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_never_mix_fields() {
        let (store, _) = store();
        let created = store.create(input("Shared")).await.unwrap();

        // Each writer sets a matching (department, status) pair; a mixed
        // record would pair one writer's department with the other's status.
        let pairs = [("AR", "OPTIMIZED"), ("GL", "STANDARDIZED")];
        let mut handles = Vec::new();
        for round in 0..8 {
            let (department, status) = pairs[round % 2];
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let patch = ProcessInput {
                    department: Some(department.to_string()),
                    status: Some(status.to_string()),
                    ..ProcessInput::default()
                };
                store.update(created.id, patch).await
            }));
        }
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            let pair = (record.fields.department, record.fields.status);
            assert!(
                pair == (Department::Ar, ProcessStatus::Optimized)
                    || pair == (Department::Gl, ProcessStatus::Standardized),
                "mixed record: {pair:?}"
            );
        }
    }

    #[tokio::test]
    async fn import_reports_bad_rows_and_keeps_good_ones() {
        let (store, _) = store();
        let csv = "Email ID,Team,Process Name,Description,Apps Used,Frequency,Duration,Volume,Process Status,Documentation\n\
                   a@b.co,AP,Invoice entry,,ERP,DAILY,00:15,12,UNSTRUCTURED,\n\
                   a@b.co,XX,Bad team,,ERP,DAILY,00:15,12,UNSTRUCTURED,\n\
                   a@b.co,GL,Close,,ERP,MONTHLY,04:00,lots,OPTIMIZED,\n\
                   a@b.co,AR,Dunning,,Email,WEEKLY,01:00,3,STANDARDIZED,\n";
        let report = store.import_csv(csv).await.unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.created, vec![1, 2]);
        assert!(report.errors[0].starts_with("Row 3: department"), "{:?}", report.errors);
        assert_eq!(report.errors[1], "Row 4: Volume: 'lots' is not a whole number");
    }

    #[tokio::test]
    async fn import_without_header_columns_writes_nothing() {
        let (store, _) = store();
        let err = store.import_csv("Email ID,Team\na@b.co,AP\n").await.unwrap_err();
        assert!(matches!(err, StoreError::Import(CsvError::MissingColumn(_))));
        assert_eq!(store.list(&ListQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn operations_after_close_are_faults() {
        let (store, _) = store();
        store.create(input("One")).await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.get(1).await,
            Err(StoreError::Fault(StorageError::Closed))
        ));
        assert!(matches!(
            store.create(input("Two")).await,
            Err(StoreError::Fault(StorageError::Closed))
        ));
    }
}
