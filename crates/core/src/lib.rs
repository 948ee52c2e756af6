//! proctrack-core: finance process record model and validation layer.
//!
//! Everything in this crate is pure: no I/O, no global state. Storage
//! backends and the HTTP surface live in `proctrack-storage` and
//! `proctrack-cli`.
//!
//! # Public API
//!
//! - [`ProcessRecord`] -- the stored entity (id, fields, derived metrics, timestamps)
//! - [`ProcessFields`] -- the validated, client-controlled part of a record
//! - [`ProcessInput`] -- raw, all-optional input used for create, update and import
//! - [`validate()`] -- the validation layer, reporting every violated field
//! - [`ListQuery`] / [`ProcessPage`] -- filtering and pagination for listings
//! - [`parse_process_csv()`] -- CSV rows to [`ProcessInput`]s for bulk import
//! - [`Clock`] -- time source injected into the store

/// Version string reported by the health endpoint.
pub const PROCTRACK_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod csv;
pub mod duration;
pub mod input;
pub mod metrics;
pub mod query;
pub mod record;
pub mod validate;

// ── Convenience re-exports ───────────────────────────────────────────

pub use clock::{Clock, FixedClock, SystemClock};
pub use csv::{parse_process_csv, CsvError, CsvRow};
pub use duration::{DurationError, WorkDuration};
pub use input::ProcessInput;
pub use metrics::YearlyMetrics;
pub use query::{ListQuery, ProcessPage, MAX_PAGE_LIMIT};
pub use record::{Department, Frequency, ProcessFields, ProcessId, ProcessRecord, ProcessStatus, UnknownValue};
pub use validate::{validate, FieldViolation, ValidationError, ValidationRules};
