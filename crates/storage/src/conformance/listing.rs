use std::future::Future;

use proctrack_core::{Department, ListQuery, ProcessPage, ProcessStatus};

use super::{check_eq, make_fields, make_filtered, TestResult, T0};
use crate::ProcessStorage;

pub(super) async fn run_listing_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "listing",
        "empty_table_lists_nothing",
        empty_table_lists_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "list_returns_insertion_order",
        list_returns_insertion_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "list_omits_deleted_rows",
        list_omits_deleted_rows(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "filter_by_department",
        filter_by_department(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "filter_by_department_and_status",
        filter_by_department_and_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "pagination_total_counts_all_matches",
        pagination_total_counts_all_matches(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "skip_past_end_is_empty_page",
        skip_past_end_is_empty_page(factory).await,
    ));

    results
}

fn names(page: &ProcessPage) -> Vec<&str> {
    page.processes
        .iter()
        .map(|r| r.fields.process_name.as_str())
        .collect()
}

/// Insert a fixed mix of departments and statuses: R1..R5.
async fn seed<S: ProcessStorage>(storage: &S) -> Result<(), String> {
    let rows = [
        ("R1", Department::Ap, ProcessStatus::Unstructured),
        ("R2", Department::Ar, ProcessStatus::Optimized),
        ("R3", Department::Ap, ProcessStatus::Optimized),
        ("R4", Department::Gl, ProcessStatus::Standardized),
        ("R5", Department::Ap, ProcessStatus::Optimized),
    ];
    for (name, department, status) in rows {
        storage
            .insert_process(make_filtered(name, department, status), T0)
            .await
            .map_err(|e| format!("insert {name} failed: {e}"))?;
    }
    Ok(())
}

async fn empty_table_lists_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let page = storage
        .list_processes(&ListQuery::default())
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("total", page.total, 0)?;
    check_eq("processes", page.processes.len(), 0)
}

async fn list_returns_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    for name in ["R1", "R2", "R3"] {
        storage
            .insert_process(make_fields(name), T0)
            .await
            .map_err(|e| format!("insert {name} failed: {e}"))?;
    }
    let page = storage
        .list_processes(&ListQuery::default())
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("names", names(&page), vec!["R1", "R2", "R3"])?;
    check_eq("total", page.total, 3)
}

async fn list_omits_deleted_rows<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;
    storage
        .delete_process(2)
        .await
        .map_err(|e| format!("delete failed: {e}"))?;
    let page = storage
        .list_processes(&ListQuery::default())
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("names", names(&page), vec!["R1", "R3", "R4", "R5"])?;
    check_eq("total", page.total, 4)
}

async fn filter_by_department<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;
    let query = ListQuery {
        department: Some(Department::Ap),
        ..ListQuery::default()
    };
    let page = storage
        .list_processes(&query)
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("names", names(&page), vec!["R1", "R3", "R5"])?;
    check_eq("total", page.total, 3)
}

async fn filter_by_department_and_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;
    let query = ListQuery {
        department: Some(Department::Ap),
        status: Some(ProcessStatus::Optimized),
        ..ListQuery::default()
    };
    let page = storage
        .list_processes(&query)
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("names", names(&page), vec!["R3", "R5"])
}

async fn pagination_total_counts_all_matches<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;
    let query = ListQuery {
        skip: 1,
        limit: Some(2),
        ..ListQuery::default()
    };
    let page = storage
        .list_processes(&query)
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("names", names(&page), vec!["R2", "R3"])?;
    check_eq("total", page.total, 5)
}

async fn skip_past_end_is_empty_page<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;
    let query = ListQuery {
        skip: 50,
        limit: Some(10),
        ..ListQuery::default()
    };
    let page = storage
        .list_processes(&query)
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    check_eq("processes", page.processes.len(), 0)?;
    check_eq("total", page.total, 5)
}
