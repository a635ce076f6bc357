//! Schema validation for untyped request payloads
//!
//! Validation never stops at the first problem: type errors, range errors
//! and structural rules are all collected so the caller can fix a request
//! in one round trip.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::{ValidationErrors, ValidationErrorsKind};

/// A single violated constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Dotted path to the offending field (e.g. `messages[1].role`)
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every violation found in a rejected payload, ordered by field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Build from a non-empty list of violations
    pub fn new(mut violations: Vec<FieldViolation>) -> Self {
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        Self { violations }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Whether `field` is among the violated paths
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationError {}

/// Collector of violations across all stages of validation
#[derive(Debug, Default)]
pub struct Violations {
    items: Vec<FieldViolation>,
}

impl Violations {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.items.push(FieldViolation::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `path` or anything nested under it was already flagged
    pub fn covers(&self, path: &str) -> bool {
        self.items.iter().any(|v| {
            v.field
                .strip_prefix(path)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('['))
        })
    }

    /// Absorb errors produced by a `validator::Validate` derive
    ///
    /// Paths already flagged by an earlier stage are not reported twice.
    pub fn extend_from_validator(&mut self, errors: &ValidationErrors, prefix: &str) {
        for (field, kind) in errors.errors() {
            let field: &str = field;
            let path = match (field, prefix.is_empty()) {
                ("__all__", _) => prefix.to_owned(),
                (_, true) => field.to_owned(),
                (_, false) => format!("{prefix}.{field}"),
            };

            match kind {
                ValidationErrorsKind::Field(_) if self.covers(&path) => {}
                ValidationErrorsKind::Field(errors) => {
                    for error in errors {
                        let message = error
                            .message
                            .as_ref()
                            .map_or_else(|| format!("failed `{}` check", error.code), ToString::to_string);
                        self.push(path.clone(), message);
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.extend_from_validator(inner, &path),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        self.extend_from_validator(inner, &format!("{path}[{index}]"));
                    }
                }
            }
        }
    }

    /// `Ok` when nothing was collected
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.items))
        }
    }
}

/// Typed, per-field reader over a raw JSON object
///
/// Each accessor deserializes one field in isolation so that one bad field
/// does not hide problems in the others.
pub struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    known: Vec<&'static str>,
}

impl<'a> FieldReader<'a> {
    /// Start reading `raw`, which must be a JSON object
    pub fn new(raw: &'a Value) -> Result<Self, ValidationError> {
        if let Value::Object(object) = raw {
            Ok(Self {
                object,
                known: Vec::new(),
            })
        } else {
            Err(ValidationError::new(vec![FieldViolation::new(
                "$",
                format!("expected a JSON object, got {}", kind_of(raw)),
            )]))
        }
    }

    /// Read a field that must be present and non-null
    pub fn required<T: DeserializeOwned>(&mut self, name: &'static str, violations: &mut Violations) -> Option<T> {
        self.known.push(name);
        match self.object.get(name) {
            None | Some(Value::Null) => {
                violations.push(name, "field is required");
                None
            }
            Some(value) => decode(name, value, violations),
        }
    }

    /// Read a field that may be absent or null
    pub fn optional<T: DeserializeOwned>(&mut self, name: &'static str, violations: &mut Violations) -> Option<T> {
        self.known.push(name);
        match self.object.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => decode(name, value, violations),
        }
    }

    /// Read a required array, decoding each element on its own
    ///
    /// Slots keep their index; an element that failed to decode is `None`
    /// so callers can still check the ones that did.
    pub fn required_list<T: DeserializeOwned>(
        &mut self,
        name: &'static str,
        violations: &mut Violations,
    ) -> Option<Vec<Option<T>>> {
        self.known.push(name);
        match self.object.get(name) {
            None | Some(Value::Null) => {
                violations.push(name, "field is required");
                None
            }
            Some(Value::Array(items)) => {
                let decoded = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| decode(&format!("{name}[{index}]"), item, violations))
                    .collect();
                Some(decoded)
            }
            Some(other) => {
                violations.push(name, format!("expected an array, got {}", kind_of(other)));
                None
            }
        }
    }

    /// Flag every field that no accessor asked for
    pub fn reject_unknown(&self, violations: &mut Violations) {
        for key in self.object.keys() {
            if !self.known.contains(&key.as_str()) {
                violations.push(key.clone(), "unknown field");
            }
        }
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: &Value, violations: &mut Violations) -> Option<T> {
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            violations.push(path, e.to_string());
            None
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
