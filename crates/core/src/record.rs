//! The process record and its enumerated field types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::duration::WorkDuration;
use crate::input::ProcessInput;
use crate::metrics::YearlyMetrics;

/// Identity assigned by the store on creation.
pub type ProcessId = u64;

/// A value outside an enumerated field's declared set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
    pub found: String,
    pub expected: &'static [&'static str],
}

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not one of {}",
            self.found,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for UnknownValue {}

/// Match `value` case-insensitively against a variant table.
fn parse_variant<T: Copy>(
    table: &[(T, &'static str)],
    names: &'static [&'static str],
    value: &str,
) -> Result<T, UnknownValue> {
    let trimmed = value.trim();
    table
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(trimmed))
        .map(|(variant, _)| *variant)
        .ok_or_else(|| UnknownValue {
            found: value.to_string(),
            expected: names,
        })
}

// ── Department ───────────────────────────────────────────────────────

/// Finance department owning a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "AP")]
    Ap,
    #[serde(rename = "AR")]
    Ar,
    #[serde(rename = "GL")]
    Gl,
    #[serde(rename = "Payroll")]
    Payroll,
}

impl Department {
    pub const NAMES: &'static [&'static str] = &["AP", "AR", "GL", "Payroll"];

    const TABLE: [(Department, &'static str); 4] = [
        (Department::Ap, "AP"),
        (Department::Ar, "AR"),
        (Department::Gl, "GL"),
        (Department::Payroll, "Payroll"),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Department::Ap => "AP",
            Department::Ar => "AR",
            Department::Gl => "GL",
            Department::Payroll => "Payroll",
        }
    }
}

impl FromStr for Department {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::TABLE, Self::NAMES, s)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Frequency ────────────────────────────────────────────────────────

/// How often a process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub const NAMES: &'static [&'static str] = &[
        "DAILY",
        "WEEKLY",
        "BI_WEEKLY",
        "MONTHLY",
        "QUARTERLY",
        "YEARLY",
    ];

    const TABLE: [(Frequency, &'static str); 6] = [
        (Frequency::Daily, "DAILY"),
        (Frequency::Weekly, "WEEKLY"),
        (Frequency::BiWeekly, "BI_WEEKLY"),
        (Frequency::Monthly, "MONTHLY"),
        (Frequency::Quarterly, "QUARTERLY"),
        (Frequency::Yearly, "YEARLY"),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::BiWeekly => "BI_WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Quarterly => "QUARTERLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::TABLE, Self::NAMES, s)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ProcessStatus ────────────────────────────────────────────────────

/// Workflow maturity of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Unstructured,
    Standardized,
    Optimized,
}

impl ProcessStatus {
    pub const NAMES: &'static [&'static str] = &["UNSTRUCTURED", "STANDARDIZED", "OPTIMIZED"];

    const TABLE: [(ProcessStatus, &'static str); 3] = [
        (ProcessStatus::Unstructured, "UNSTRUCTURED"),
        (ProcessStatus::Standardized, "STANDARDIZED"),
        (ProcessStatus::Optimized, "OPTIMIZED"),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Unstructured => "UNSTRUCTURED",
            ProcessStatus::Standardized => "STANDARDIZED",
            ProcessStatus::Optimized => "OPTIMIZED",
        }
    }
}

impl FromStr for ProcessStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(&Self::TABLE, Self::NAMES, s)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Records ──────────────────────────────────────────────────────────

/// The validated, client-controlled fields of a process.
///
/// Only [`crate::validate()`] produces values of this type from untrusted
/// input, so enum fields can never hold an undeclared value and `volume`
/// and `duration` are always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFields {
    pub email: String,
    pub department: Department,
    pub process_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub apps_used: String,
    pub frequency: Frequency,
    pub duration: WorkDuration,
    pub volume: u32,
    pub status: ProcessStatus,
    #[serde(default)]
    pub documentation: Option<String>,
}

impl ProcessFields {
    /// Individual entries of the comma-separated `apps_used` list.
    pub fn apps(&self) -> impl Iterator<Item = &str> {
        self.apps_used
            .split(',')
            .map(str::trim)
            .filter(|app| !app.is_empty())
    }

    pub fn yearly_metrics(&self) -> YearlyMetrics {
        YearlyMetrics::compute(self.volume, self.frequency, self.duration)
    }

    /// The input form of these fields, used as the base of a partial update.
    pub fn to_input(&self) -> ProcessInput {
        ProcessInput {
            email: Some(self.email.clone()),
            department: Some(self.department.as_str().to_string()),
            process_name: Some(self.process_name.clone()),
            description: Some(self.description.clone()),
            apps_used: Some(self.apps_used.clone()),
            frequency: Some(self.frequency.as_str().to_string()),
            duration: Some(self.duration.to_string()),
            volume: Some(i64::from(self.volume)),
            status: Some(self.status.as_str().to_string()),
            documentation: Some(self.documentation.clone()),
        }
    }
}

/// A stored process: identity, fields, derived yearly metrics and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub id: ProcessId,
    #[serde(flatten)]
    pub fields: ProcessFields,
    pub yearly_volume: u64,
    pub yearly_duration: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ProcessRecord {
    /// Build a freshly created record; both timestamps are `now`.
    pub fn new(id: ProcessId, fields: ProcessFields, now: OffsetDateTime) -> Self {
        let metrics = fields.yearly_metrics();
        Self {
            id,
            fields,
            yearly_volume: metrics.volume,
            yearly_duration: metrics.duration_label(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the fields, keeping identity and `created_at`.
    pub fn revise(&self, fields: ProcessFields, now: OffsetDateTime) -> Self {
        let metrics = fields.yearly_metrics();
        Self {
            id: self.id,
            fields,
            yearly_volume: metrics.volume,
            yearly_duration: metrics.duration_label(),
            created_at: self.created_at,
            updated_at: now,
        }
    }
}
