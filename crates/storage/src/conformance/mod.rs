//! Conformance test suite for `ProcessStorage` implementations.
//!
//! A backend-agnostic suite that any `ProcessStorage` implementation can run
//! to verify it behaves like the others. The suite covers:
//!
//! - **CRUD**: insert, get, replace and delete round trips
//! - **Identity**: ids strictly increase and are never reused
//! - **Listing**: insertion order, filters, pagination and totals
//! - **Version validation / OCC**: conditional replace and conflict errors
//! - **Concurrency**: racing writers never lose or mix an update
//! - **Lifecycle**: closed backends reject every operation
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use proctrack_storage::conformance::run_conformance_suite;
//! use proctrack_storage::MemoryStorage;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod crud;
mod lifecycle;
mod listing;
mod version;

use std::fmt;
use std::future::Future;

use serde::Serialize;
use time::macros::datetime;
use time::OffsetDateTime;

use proctrack_core::{Department, Frequency, ProcessFields, ProcessStatus, WorkDuration};

use crate::ProcessStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Test category (e.g. "crud", "listing", "version").
    pub category: String,
    /// Test name (e.g. "insert_assigns_version_one").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone, Serialize)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ProcessStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(crud::run_crud_tests(&factory).await);
    results.extend(listing::run_listing_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(lifecycle::run_lifecycle_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: fields and timestamps with sensible defaults ────────────────────

const T0: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
const T1: OffsetDateTime = datetime!(2025-01-01 00:01 UTC);

const FIXTURE_DURATION: WorkDuration = match WorkDuration::new(1, 30) {
    Ok(duration) => duration,
    Err(_) => panic!("fixture duration out of range"),
};

fn make_fields(name: &str) -> ProcessFields {
    ProcessFields {
        email: "clerk@example.com".to_string(),
        department: Department::Ap,
        process_name: name.to_string(),
        description: Some("conformance fixture".to_string()),
        apps_used: "ERP".to_string(),
        frequency: Frequency::Monthly,
        duration: FIXTURE_DURATION,
        volume: 2,
        status: ProcessStatus::Unstructured,
        documentation: None,
    }
}

fn make_filtered(name: &str, department: Department, status: ProcessStatus) -> ProcessFields {
    ProcessFields {
        department,
        status,
        ..make_fields(name)
    }
}

/// Assert-style helper: `Err` with a message when the values differ.
fn check_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}
