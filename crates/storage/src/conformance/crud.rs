use std::future::Future;

use proctrack_core::{Department, Frequency, ProcessStatus};

use super::{check_eq, make_fields, TestResult, T0, T1};
use crate::{ProcessStorage, StorageError};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Insert
    results.push(TestResult::from_result(
        "crud",
        "insert_assigns_id_one_on_empty_table",
        insert_assigns_id_one_on_empty_table(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "insert_stamps_both_timestamps",
        insert_stamps_both_timestamps(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "insert_computes_yearly_metrics",
        insert_computes_yearly_metrics(factory).await,
    ));

    // Get
    results.push(TestResult::from_result(
        "crud",
        "get_returns_inserted_row",
        get_returns_inserted_row(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "get_missing_returns_not_found",
        get_missing_returns_not_found(factory).await,
    ));

    // Replace
    results.push(TestResult::from_result(
        "crud",
        "replace_keeps_id_and_created_at",
        replace_keeps_id_and_created_at(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "replace_recomputes_metrics",
        replace_recomputes_metrics(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "replace_missing_returns_not_found",
        replace_missing_returns_not_found(factory).await,
    ));

    // Delete
    results.push(TestResult::from_result(
        "crud",
        "delete_then_get_returns_not_found",
        delete_then_get_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_missing_returns_not_found",
        delete_missing_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "delete_twice_returns_not_found",
        delete_twice_returns_not_found(factory).await,
    ));

    // Identity
    results.push(TestResult::from_result(
        "crud",
        "ids_strictly_increase",
        ids_strictly_increase(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "deleted_ids_are_never_reused",
        deleted_ids_are_never_reused(factory).await,
    ));

    results
}

// ── Insert ──────────────────────────────────────────────────────────────────

async fn insert_assigns_id_one_on_empty_table<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("first"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    check_eq("id", row.record.id, 1)?;
    check_eq("version", row.version, 1)
}

async fn insert_stamps_both_timestamps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("stamped"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    check_eq("created_at", row.record.created_at, T0)?;
    check_eq("updated_at", row.record.updated_at, T0)
}

async fn insert_computes_yearly_metrics<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    // Monthly, volume 2, 01:30 per run: 24 runs, 36 hours.
    let row = storage
        .insert_process(make_fields("metrics"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    check_eq("yearly_volume", row.record.yearly_volume, 24)?;
    check_eq("yearly_duration", row.record.yearly_duration.as_str(), "36:00")
}

// ── Get ─────────────────────────────────────────────────────────────────────

async fn get_returns_inserted_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let inserted = storage
        .insert_process(make_fields("roundtrip"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let fetched = storage
        .get_process(inserted.record.id)
        .await
        .map_err(|e| format!("get failed: {e}"))?;
    check_eq("row", fetched, inserted)
}

async fn get_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_process(42).await {
        Err(StorageError::NotFound { id: 42 }) => Ok(()),
        Err(e) => Err(format!("expected NotFound {{ id: 42 }}, got {e:?}")),
        Ok(row) => Err(format!("expected NotFound, got {row:?}")),
    }
}

// ── Replace ─────────────────────────────────────────────────────────────────

async fn replace_keeps_id_and_created_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let inserted = storage
        .insert_process(make_fields("before"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let mut fields = make_fields("after");
    fields.department = Department::Payroll;

    let replaced = storage
        .replace_process(inserted.record.id, 1, fields.clone(), T1)
        .await
        .map_err(|e| format!("replace failed: {e}"))?;
    check_eq("id", replaced.record.id, inserted.record.id)?;
    check_eq("created_at", replaced.record.created_at, T0)?;
    check_eq("updated_at", replaced.record.updated_at, T1)?;
    check_eq("fields", replaced.record.fields, fields)
}

async fn replace_recomputes_metrics<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let inserted = storage
        .insert_process(make_fields("metrics"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let mut fields = make_fields("metrics");
    fields.frequency = Frequency::Quarterly;
    fields.status = ProcessStatus::Optimized;

    let replaced = storage
        .replace_process(inserted.record.id, 1, fields, T1)
        .await
        .map_err(|e| format!("replace failed: {e}"))?;
    // Quarterly, volume 2, 01:30 per run: 8 runs, 12 hours.
    check_eq("yearly_volume", replaced.record.yearly_volume, 8)?;
    check_eq("yearly_duration", replaced.record.yearly_duration.as_str(), "12:00")
}

async fn replace_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.replace_process(7, 1, make_fields("ghost"), T1).await {
        Err(StorageError::NotFound { id: 7 }) => Ok(()),
        Err(e) => Err(format!("expected NotFound {{ id: 7 }}, got {e:?}")),
        Ok(row) => Err(format!("expected NotFound, got {row:?}")),
    }
}

// ── Delete ──────────────────────────────────────────────────────────────────

async fn delete_then_get_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("doomed"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    storage
        .delete_process(row.record.id)
        .await
        .map_err(|e| format!("delete failed: {e}"))?;
    match storage.get_process(row.record.id).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound after delete, got {other:?}")),
    }
}

async fn delete_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.delete_process(3).await {
        Err(StorageError::NotFound { id: 3 }) => Ok(()),
        other => Err(format!("expected NotFound {{ id: 3 }}, got {other:?}")),
    }
}

async fn delete_twice_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("twice"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    storage
        .delete_process(row.record.id)
        .await
        .map_err(|e| format!("first delete failed: {e}"))?;
    match storage.delete_process(row.record.id).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound on second delete, got {other:?}")),
    }
}

// ── Identity ────────────────────────────────────────────────────────────────

async fn ids_strictly_increase<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut last = 0;
    for i in 0..5 {
        let row = storage
            .insert_process(make_fields(&format!("p{i}")), T0)
            .await
            .map_err(|e| format!("insert {i} failed: {e}"))?;
        if row.record.id <= last {
            return Err(format!("id {} not greater than previous {last}", row.record.id));
        }
        last = row.record.id;
    }
    Ok(())
}

async fn deleted_ids_are_never_reused<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let a = storage
        .insert_process(make_fields("a"), T0)
        .await
        .map_err(|e| format!("insert a failed: {e}"))?;
    let b = storage
        .insert_process(make_fields("b"), T0)
        .await
        .map_err(|e| format!("insert b failed: {e}"))?;
    storage
        .delete_process(b.record.id)
        .await
        .map_err(|e| format!("delete b failed: {e}"))?;
    storage
        .delete_process(a.record.id)
        .await
        .map_err(|e| format!("delete a failed: {e}"))?;

    let c = storage
        .insert_process(make_fields("c"), T0)
        .await
        .map_err(|e| format!("insert c failed: {e}"))?;
    if c.record.id == a.record.id || c.record.id == b.record.id {
        return Err(format!("id {} was reused after delete", c.record.id));
    }
    check_eq("next id", c.record.id, b.record.id + 1)
}
