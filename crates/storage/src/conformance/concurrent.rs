use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use proctrack_core::ListQuery;

use super::{check_eq, make_fields, TestResult, T0, T1};
use crate::{ProcessStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_replaces_exactly_one_wins",
        concurrent_replaces_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_get_distinct_ids",
        concurrent_inserts_get_distinct_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_replaces_different_rows_all_succeed",
        concurrent_replaces_different_rows_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_replaces_final_state_is_winner",
        concurrent_replaces_final_state_is_winner(factory).await,
    ));

    results
}

/// Spawn N replaces of one row, all from version 1. Returns the name each
/// winner wrote.
async fn race_on_one_row<S: ProcessStorage>(
    storage: &Arc<S>,
    id: u64,
) -> Result<Vec<String>, String> {
    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("writer-{i}");
            match s.replace_process(id, 1, make_fields(&name), T1).await {
                Ok(_) => Ok(Some(name)),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        winners.extend(won);
    }
    Ok(winners)
}

// ── Concurrent replace: exactly one wins ────────────────────────────────────

/// N tasks each replace the same row from version 1. Exactly one replace
/// succeeds; the rest must get ConcurrentConflict.
async fn concurrent_replaces_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let row = storage
        .insert_process(make_fields("contended"), T0)
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let winners = race_on_one_row(&storage, row.record.id).await?;
    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    }
    Ok(())
}

// ── Concurrent insert: distinct ids ─────────────────────────────────────────

async fn concurrent_inserts_get_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.insert_process(make_fields(&format!("p{i}")), T0).await
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        let row = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        ids.insert(row.record.id);
    }
    check_eq("distinct ids", ids.len(), N)?;

    let page = storage
        .list_processes(&ListQuery::default())
        .await
        .map_err(|e| format!("list: {e}"))?;
    check_eq("total", page.total, N)
}

// ── Concurrent replaces of different rows: all succeed ──────────────────────

/// N tasks each replace a different row. All should succeed; there is no
/// contention so there must be no false conflicts.
async fn concurrent_replaces_different_rows_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let mut ids = Vec::new();
    for i in 0..N {
        let row = storage
            .insert_process(make_fields(&format!("row-{i}")), T0)
            .await
            .map_err(|e| format!("insert {i}: {e}"))?;
        ids.push(row.record.id);
    }

    let mut handles = Vec::new();
    for id in ids {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.replace_process(id, 1, make_fields(&format!("row-{id}-v2")), T1)
                .await
        }));
    }
    for handle in handles {
        let row = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("unexpected failure: {e}"))?;
        check_eq("version", row.version, 2)?;
    }
    Ok(())
}

// ── Final state matches the single winner ───────────────────────────────────

/// After a race, the stored row holds exactly the winner's fields at
/// version 2. No loser's write may leak in.
async fn concurrent_replaces_final_state_is_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let row = storage
        .insert_process(make_fields("contended"), T0)
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let winners = race_on_one_row(&storage, row.record.id).await?;
    let [winner] = winners.as_slice() else {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    };

    let stored = storage
        .get_process(row.record.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    check_eq("version", stored.version, 2)?;
    check_eq("fields", stored.record.fields, make_fields(winner))
}
