//! Raw, unvalidated process input.

use serde_json::{Map, Value};

use crate::validate::{FieldViolation, ValidationError};

/// Client-supplied process fields before validation.
///
/// Every field is optional: a create request must supply all required
/// fields (validation reports the missing ones), while an update request
/// supplies only the fields it replaces. Enumerated fields are kept as
/// text so that an out-of-set value is reported against its field rather
/// than rejected by deserialization.
///
/// The two nullable fields, `description` and `documentation`, carry a
/// second level: `None` means not supplied, `Some(None)` means an explicit
/// `null`, which clears the field on update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInput {
    pub email: Option<String>,
    pub department: Option<String>,
    pub process_name: Option<String>,
    pub description: Option<Option<String>>,
    pub apps_used: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub volume: Option<i64>,
    pub status: Option<String>,
    pub documentation: Option<Option<String>>,
}

/// Look up a field by its wire name or any accepted alias. `null` counts as
/// absent; nullable fields go through [`nullable_text_field`] instead.
fn lookup<'a>(object: &'a Map<String, Value>, name: &str, aliases: &[&str]) -> Option<&'a Value> {
    std::iter::once(name)
        .chain(aliases.iter().copied())
        .filter_map(|key| object.get(key))
        .find(|value| !value.is_null())
}

fn text_field(
    object: &Map<String, Value>,
    name: &str,
    aliases: &[&str],
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match lookup(object, name, aliases)? {
        Value::String(text) => Some(text.clone()),
        _ => {
            violations.push(FieldViolation::new(name, "must be a string"));
            None
        }
    }
}

fn nullable_text_field(
    object: &Map<String, Value>,
    name: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<Option<String>> {
    match object.get(name)? {
        Value::Null => Some(None),
        Value::String(text) => Some(Some(text.clone())),
        _ => {
            violations.push(FieldViolation::new(name, "must be a string or null"));
            None
        }
    }
}

fn integer_field(
    object: &Map<String, Value>,
    name: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<i64> {
    let value = lookup(object, name, &[])?;
    match value.as_i64() {
        Some(n) => Some(n),
        None => {
            violations.push(FieldViolation::new(name, "must be a whole number"));
            None
        }
    }
}

/// Replace `base` when the patch supplies a value.
fn overlay_field<T>(base: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *base = patch;
    }
}

impl ProcessInput {
    /// Read input from a JSON request body.
    ///
    /// Accepts the camelCase wire names plus the snake_case names used by
    /// older clients (`email_id`, `process_name`, `apps_used`,
    /// `process_status`). Unknown keys, including `id` and the timestamp
    /// fields, are ignored. Type mismatches are reported per field. A `null`
    /// required field counts as absent.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::single("body", "must be a JSON object"));
        };

        let mut violations = Vec::new();
        let input = ProcessInput {
            email: text_field(object, "email", &["email_id"], &mut violations),
            department: text_field(object, "department", &[], &mut violations),
            process_name: text_field(object, "processName", &["process_name"], &mut violations),
            description: nullable_text_field(object, "description", &mut violations),
            apps_used: text_field(object, "appsUsed", &["apps_used"], &mut violations),
            frequency: text_field(object, "frequency", &[], &mut violations),
            duration: text_field(object, "duration", &[], &mut violations),
            volume: integer_field(object, "volume", &mut violations),
            status: text_field(object, "status", &["process_status"], &mut violations),
            documentation: nullable_text_field(object, "documentation", &mut violations),
        };

        if violations.is_empty() {
            Ok(input)
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// Apply a partial update on top of this input: every field the patch
    /// supplies replaces the current value, the rest are kept.
    pub fn overlay(mut self, patch: ProcessInput) -> ProcessInput {
        overlay_field(&mut self.email, patch.email);
        overlay_field(&mut self.department, patch.department);
        overlay_field(&mut self.process_name, patch.process_name);
        overlay_field(&mut self.description, patch.description);
        overlay_field(&mut self.apps_used, patch.apps_used);
        overlay_field(&mut self.frequency, patch.frequency);
        overlay_field(&mut self.duration, patch.duration);
        overlay_field(&mut self.volume, patch.volume);
        overlay_field(&mut self.status, patch.status);
        overlay_field(&mut self.documentation, patch.documentation);
        self
    }

    /// Wire names of the fields this input supplies.
    pub fn supplied_fields(&self) -> Vec<&'static str> {
        let flags = [
            ("email", self.email.is_some()),
            ("department", self.department.is_some()),
            ("processName", self.process_name.is_some()),
            ("description", self.description.is_some()),
            ("appsUsed", self.apps_used.is_some()),
            ("frequency", self.frequency.is_some()),
            ("duration", self.duration.is_some()),
            ("volume", self.volume.is_some()),
            ("status", self.status.is_some()),
            ("documentation", self.documentation.is_some()),
        ];
        flags
            .into_iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_wire_names() {
        let input = ProcessInput::from_json(&json!({
            "email": "a@b.co",
            "processName": "Close books",
            "volume": 3,
            "id": 99,
            "createdAt": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(input.email.as_deref(), Some("a@b.co"));
        assert_eq!(input.process_name.as_deref(), Some("Close books"));
        assert_eq!(input.volume, Some(3));
        assert_eq!(input.department, None);
    }

    #[test]
    fn accepts_snake_case_aliases() {
        let input = ProcessInput::from_json(&json!({
            "email_id": "a@b.co",
            "process_name": "Close books",
            "apps_used": "ERP",
            "process_status": "OPTIMIZED"
        }))
        .unwrap();
        assert_eq!(input.email.as_deref(), Some("a@b.co"));
        assert_eq!(input.process_name.as_deref(), Some("Close books"));
        assert_eq!(input.apps_used.as_deref(), Some("ERP"));
        assert_eq!(input.status.as_deref(), Some("OPTIMIZED"));
    }

    #[test]
    fn null_required_field_is_absent() {
        let input = ProcessInput::from_json(&json!({ "email": null, "volume": null })).unwrap();
        assert_eq!(input, ProcessInput::default());
    }

    #[test]
    fn null_nullable_field_is_an_explicit_clear() {
        let input = ProcessInput::from_json(&json!({
            "description": null,
            "documentation": "wiki/close"
        }))
        .unwrap();
        assert_eq!(input.description, Some(None));
        assert_eq!(input.documentation, Some(Some("wiki/close".to_string())));
        assert_eq!(input.supplied_fields(), vec!["description", "documentation"]);

        let err = ProcessInput::from_json(&json!({ "documentation": 3 })).unwrap_err();
        assert_eq!(err.fields(), vec!["documentation"]);
    }

    #[test]
    fn reports_every_type_mismatch() {
        let err = ProcessInput::from_json(&json!({
            "email": 12,
            "volume": "many",
            "duration": ["01:00"]
        }))
        .unwrap_err();
        assert_eq!(err.fields(), vec!["email", "duration", "volume"]);
    }

    #[test]
    fn rejects_non_object_bodies() {
        let err = ProcessInput::from_json(&json!([1, 2])).unwrap_err();
        assert_eq!(err.fields(), vec!["body"]);
    }

    #[test]
    fn overlay_replaces_only_supplied_fields() {
        let base = ProcessInput {
            email: Some("a@b.co".into()),
            process_name: Some("Old".into()),
            volume: Some(4),
            ..ProcessInput::default()
        };
        let patch = ProcessInput {
            process_name: Some("New".into()),
            ..ProcessInput::default()
        };
        let merged = base.overlay(patch);
        assert_eq!(merged.email.as_deref(), Some("a@b.co"));
        assert_eq!(merged.process_name.as_deref(), Some("New"));
        assert_eq!(merged.volume, Some(4));
    }

    #[test]
    fn overlay_clears_and_keeps_nullable_fields() {
        let base = ProcessInput {
            description: Some(Some("old text".into())),
            documentation: Some(Some("wiki/close".into())),
            ..ProcessInput::default()
        };
        let patch = ProcessInput {
            description: Some(None),
            ..ProcessInput::default()
        };
        let merged = base.overlay(patch);
        assert_eq!(merged.description, Some(None));
        assert_eq!(merged.documentation, Some(Some("wiki/close".into())));
    }

    #[test]
    fn supplied_fields_uses_wire_names() {
        let patch = ProcessInput {
            apps_used: Some("Excel".into()),
            volume: Some(1),
            ..ProcessInput::default()
        };
        assert_eq!(patch.supplied_fields(), vec!["appsUsed", "volume"]);
    }
}
