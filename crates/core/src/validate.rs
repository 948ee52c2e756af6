//! Validation layer: turns a [`ProcessInput`] into [`ProcessFields`] or a
//! [`ValidationError`] listing every violated field.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::duration::WorkDuration;
use crate::input::ProcessInput;
use crate::record::{Department, Frequency, ProcessFields, ProcessStatus, UnknownValue};

pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_PROCESS_NAME_LEN: usize = 25;
pub const MAX_DESCRIPTION_LEN: usize = 70;

/// Applications accepted in `appsUsed` when [`ValidationRules::strict_apps`] is set.
pub const KNOWN_APPS: &[&str] = &[
    "ERP",
    "Excel",
    "Browser",
    "PDF",
    "Email",
    "Legacy Systems",
    "Reporting Tools",
];

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$",
    )
    .expect("email pattern is a valid regex")
});

/// Deployment-specific validation switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationRules {
    /// Restrict `appsUsed` entries to [`KNOWN_APPS`].
    pub strict_apps: bool,
}

/// One violated constraint, named by the field's wire name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every constraint an input violated, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    pub fn single(field: &str, reason: &str) -> Self {
        Self::new(vec![FieldViolation::new(field, reason)])
    }

    /// Names of the violated fields, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    pub fn names_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid process: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", violation.field, violation.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collects violations while checking fields one by one.
#[derive(Default)]
struct Checker {
    violations: Vec<FieldViolation>,
}

impl Checker {
    fn fail(&mut self, field: &str, reason: impl Into<String>) {
        self.violations.push(FieldViolation::new(field, reason));
    }

    /// Present and not blank.
    fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            None => {
                self.fail(field, "is required");
                None
            }
            Some(text) if text.trim().is_empty() => {
                self.fail(field, "must not be empty");
                None
            }
            Some(text) => Some(text),
        }
    }

    fn bounded<'a>(&mut self, field: &str, value: &'a str, max: usize) -> Option<&'a str> {
        let len = value.chars().count();
        if len > max {
            self.fail(field, format!("must be at most {max} characters (got {len})"));
            None
        } else {
            Some(value)
        }
    }

    fn member<T: FromStr<Err = UnknownValue>>(&mut self, field: &str, value: Option<&str>) -> Option<T> {
        let text = self.required(field, value)?;
        match text.parse::<T>() {
            Ok(variant) => Some(variant),
            Err(err) => {
                self.fail(field, err.to_string());
                None
            }
        }
    }

    fn email(&mut self, value: Option<&str>) -> Option<String> {
        let text = self.required("email", value)?;
        let text = self.bounded("email", text, MAX_EMAIL_LEN)?;
        if EMAIL_PATTERN.is_match(text) {
            Some(text.to_string())
        } else {
            self.fail("email", "must be a valid email address");
            None
        }
    }

    fn apps(&mut self, value: Option<&str>, rules: &ValidationRules) -> Option<String> {
        let text = self.required("appsUsed", value)?;
        let entries: Vec<&str> = text.split(',').map(str::trim).collect();
        if entries.iter().any(|entry| entry.is_empty()) {
            self.fail("appsUsed", "must not contain empty entries");
            return None;
        }
        if rules.strict_apps {
            let unknown: Vec<&str> = entries
                .iter()
                .copied()
                .filter(|entry| !KNOWN_APPS.contains(entry))
                .collect();
            if !unknown.is_empty() {
                self.fail("appsUsed", format!("unknown apps: {}", unknown.join(", ")));
                return None;
            }
        }
        Some(text.to_string())
    }

    fn duration(&mut self, value: Option<&str>) -> Option<WorkDuration> {
        let text = self.required("duration", value)?;
        match text.parse::<WorkDuration>() {
            Ok(duration) => Some(duration),
            Err(err) => {
                self.fail("duration", err.to_string());
                None
            }
        }
    }

    fn volume(&mut self, value: Option<i64>) -> Option<u32> {
        let Some(n) = value else {
            self.fail("volume", "is required");
            return None;
        };
        if n < 1 {
            self.fail("volume", "must be at least 1");
            return None;
        }
        match u32::try_from(n) {
            Ok(volume) => Some(volume),
            Err(_) => {
                self.fail("volume", format!("must be at most {}", u32::MAX));
                None
            }
        }
    }

    fn optional_text(&mut self, field: &str, value: Option<&str>, max: Option<usize>) -> Option<String> {
        let text = value?;
        match max {
            Some(max) => self.bounded(field, text, max).map(str::to_string),
            None => Some(text.to_string()),
        }
    }
}

/// Validate an input against the record schema.
///
/// Checks required-field presence, enum membership, length bounds, volume
/// positivity, email syntax and the `HH:MM` duration pattern. All violated
/// fields are reported, in schema order.
pub fn validate(input: &ProcessInput, rules: &ValidationRules) -> Result<ProcessFields, ValidationError> {
    let mut check = Checker::default();

    let email = check.email(input.email.as_deref());
    let department = check.member::<Department>("department", input.department.as_deref());
    let process_name = check
        .required("processName", input.process_name.as_deref())
        .and_then(|name| check.bounded("processName", name, MAX_PROCESS_NAME_LEN))
        .map(str::to_string);
    let description = check.optional_text(
        "description",
        input.description.as_ref().and_then(Option::as_deref),
        Some(MAX_DESCRIPTION_LEN),
    );
    let apps_used = check.apps(input.apps_used.as_deref(), rules);
    let frequency = check.member::<Frequency>("frequency", input.frequency.as_deref());
    let duration = check.duration(input.duration.as_deref());
    let volume = check.volume(input.volume);
    let status = check.member::<ProcessStatus>("status", input.status.as_deref());
    let documentation = check.optional_text(
        "documentation",
        input.documentation.as_ref().and_then(Option::as_deref),
        None,
    );

    if !check.violations.is_empty() {
        return Err(ValidationError::new(check.violations));
    }

    match (email, department, process_name, apps_used, frequency, duration, volume, status) {
        (
            Some(email),
            Some(department),
            Some(process_name),
            Some(apps_used),
            Some(frequency),
            Some(duration),
            Some(volume),
            Some(status),
        ) => Ok(ProcessFields {
            email,
            department,
            process_name,
            description,
            apps_used,
            frequency,
            duration,
            volume,
            status,
            documentation,
        }),
        // Every None above recorded a violation.
        _ => Err(ValidationError::single("body", "incomplete process")),
    }
}
