use std::future::Future;

use super::{check_eq, make_fields, TestResult, T0, T1};
use crate::{ProcessStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Basic version tracking
    results.push(TestResult::from_result(
        "version",
        "version_starts_at_one",
        version_starts_at_one(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "version_increments_sequentially",
        version_increments_sequentially(factory).await,
    ));

    // Wrong version fails
    results.push(TestResult::from_result(
        "version",
        "replace_with_stale_version_returns_conflict",
        replace_with_stale_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "replace_with_future_version_returns_conflict",
        replace_with_future_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_has_correct_fields",
        conflict_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_leaves_row_unchanged",
        conflict_leaves_row_unchanged(factory).await,
    ));

    results
}

async fn version_starts_at_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("v"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let fetched = storage
        .get_process(row.record.id)
        .await
        .map_err(|e| format!("get failed: {e}"))?;
    check_eq("version", fetched.version, 1)
}

async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("v"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let id = row.record.id;

    for expected in 1..=5 {
        let replaced = storage
            .replace_process(id, expected, make_fields(&format!("v{expected}")), T1)
            .await
            .map_err(|e| format!("replace at version {expected} failed: {e}"))?;
        check_eq("returned version", replaced.version, expected + 1)?;
    }
    let fetched = storage
        .get_process(id)
        .await
        .map_err(|e| format!("get failed: {e}"))?;
    check_eq("stored version", fetched.version, 6)
}

async fn replace_with_stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("v"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let id = row.record.id;
    storage
        .replace_process(id, 1, make_fields("first writer"), T1)
        .await
        .map_err(|e| format!("first replace failed: {e}"))?;

    match storage.replace_process(id, 1, make_fields("second writer"), T1).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

async fn replace_with_future_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("v"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    match storage
        .replace_process(row.record.id, 2, make_fields("too early"), T1)
        .await
    {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

async fn conflict_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage
        .insert_process(make_fields("a"), T0)
        .await
        .map_err(|e| format!("insert a failed: {e}"))?;
    let b = storage
        .insert_process(make_fields("b"), T0)
        .await
        .map_err(|e| format!("insert b failed: {e}"))?;

    match storage.replace_process(b.record.id, 9, make_fields("b2"), T1).await {
        Err(StorageError::ConcurrentConflict {
            id,
            expected_version,
        }) => {
            check_eq("conflict id", id, b.record.id)?;
            check_eq("conflict expected_version", expected_version, 9)
        }
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

async fn conflict_leaves_row_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("original"), T0)
        .await
        .map_err(|e| format!("insert failed: {e}"))?;
    let _ = storage
        .replace_process(row.record.id, 5, make_fields("rejected"), T1)
        .await;
    let fetched = storage
        .get_process(row.record.id)
        .await
        .map_err(|e| format!("get failed: {e}"))?;
    check_eq("row after conflict", fetched, row)
}
