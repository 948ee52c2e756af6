//! Listing: filters, pagination and the page shape returned to clients.

use serde::Serialize;

use crate::record::{Department, ProcessRecord, ProcessStatus};
use crate::validate::{FieldViolation, ValidationError};

/// Largest page a client may request.
pub const MAX_PAGE_LIMIT: usize = 100;

/// A stateless list request. The default lists every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub skip: usize,
    pub limit: Option<usize>,
    pub department: Option<Department>,
    pub status: Option<ProcessStatus>,
}

/// One page of a listing. `total` counts every record matching the
/// filters, before `skip`/`limit` are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessPage {
    pub processes: Vec<ProcessRecord>,
    pub total: usize,
}

impl ListQuery {
    /// Build a query from URL query parameters.
    ///
    /// Recognised keys are `skip`, `limit` (1..=[`MAX_PAGE_LIMIT`]),
    /// `department` and `status`; others are ignored. Every malformed
    /// parameter is reported.
    pub fn from_params<'a, I>(params: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = ListQuery::default();
        let mut violations = Vec::new();

        for (key, value) in params {
            match key {
                "skip" => match value.parse::<usize>() {
                    Ok(skip) => query.skip = skip,
                    Err(_) => violations.push(FieldViolation::new("skip", "must be a non-negative integer")),
                },
                "limit" => match value.parse::<usize>() {
                    Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => query.limit = Some(limit),
                    _ => violations.push(FieldViolation::new(
                        "limit",
                        format!("must be an integer between 1 and {MAX_PAGE_LIMIT}"),
                    )),
                },
                "department" if !value.is_empty() => match value.parse::<Department>() {
                    Ok(department) => query.department = Some(department),
                    Err(err) => violations.push(FieldViolation::new("department", err.to_string())),
                },
                "status" if !value.is_empty() => match value.parse::<ProcessStatus>() {
                    Ok(status) => query.status = Some(status),
                    Err(err) => violations.push(FieldViolation::new("status", err.to_string())),
                },
                _ => {}
            }
        }

        if violations.is_empty() {
            Ok(query)
        } else {
            Err(ValidationError::new(violations))
        }
    }

    pub fn matches(&self, record: &ProcessRecord) -> bool {
        self.department.is_none_or(|d| record.fields.department == d)
            && self.status.is_none_or(|s| record.fields.status == s)
    }

    /// Filter and paginate records that are already in insertion order.
    pub fn apply<'a, I>(&self, records: I) -> ProcessPage
    where
        I: IntoIterator<Item = &'a ProcessRecord>,
    {
        let matching: Vec<&ProcessRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        ProcessPage {
            processes: page,
            total,
        }
    }
}
