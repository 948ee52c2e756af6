use std::future::Future;

use proctrack_core::ListQuery;

use super::{make_fields, TestResult, T0, T1};
use crate::{ProcessStorage, StorageError};

pub(super) async fn run_lifecycle_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "lifecycle",
        "closed_storage_rejects_every_operation",
        closed_storage_rejects_every_operation(factory).await,
    ));
    results.push(TestResult::from_result(
        "lifecycle",
        "close_is_idempotent",
        close_is_idempotent(factory).await,
    ));

    results
}

fn expect_closed<T: std::fmt::Debug>(op: &str, result: Result<T, StorageError>) -> Result<(), String> {
    match result {
        Err(StorageError::Closed) => Ok(()),
        other => Err(format!("{op} after close: expected Closed, got {other:?}")),
    }
}

async fn closed_storage_rejects_every_operation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let row = storage
        .insert_process(make_fields("kept"), T0)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let id = row.record.id;
    storage.close().await.map_err(|e| format!("close: {e}"))?;

    expect_closed("insert", storage.insert_process(make_fields("late"), T1).await)?;
    expect_closed("get", storage.get_process(id).await)?;
    expect_closed("list", storage.list_processes(&ListQuery::default()).await)?;
    expect_closed("replace", storage.replace_process(id, 1, make_fields("late"), T1).await)?;
    expect_closed("delete", storage.delete_process(id).await)
}

async fn close_is_idempotent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage.close().await.map_err(|e| format!("first close: {e}"))?;
    storage.close().await.map_err(|e| format!("second close: {e}"))
}
