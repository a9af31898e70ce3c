//! Validation of submitted task configuration forms.
//!
//! - `FieldTypeValidators`: built-in `string`/`int`/`boolean` plus custom type tags
//! - `AutocompleteValidators`: allowed-value predicates keyed by source id
//! - `ConfigurationValidator`: accumulative form check against a job kind schema

mod autocomplete;
mod types;
mod validator;

use std::fmt;

use serde::Serialize;

pub use autocomplete::AutocompleteValidators;
pub use types::FieldTypeValidators;
pub use validator::ConfigurationValidator;

/// Predicate over a raw submitted value
pub type ValuePredicate = std::sync::Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Where in a form a violation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    /// `jobKind`
    JobKind,
    /// `cronExpression`
    CronExpression,
    /// `fields`, used for required fields that were not submitted at all
    Fields,
    /// `fields[i].value`, `i` being the position in the submitted list
    FieldValue(usize),
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::JobKind => f.write_str("jobKind"),
            FieldPath::CronExpression => f.write_str("cronExpression"),
            FieldPath::Fields => f.write_str("fields"),
            FieldPath::FieldValue(index) => write!(f, "fields[{}].value", index),
        }
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: FieldPath,
    pub message: String,
}

/// Every violation found in one form, in the order they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: FieldPath, message: impl Into<String>) {
        self.violations.push(Violation {
            path,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    /// Messages recorded at `path`
    pub fn messages_at(&self, path: FieldPath) -> Vec<&str> {
        self.violations
            .iter()
            .filter(|v| v.path == path)
            .map(|v| v.message.as_str())
            .collect()
    }

    /// Messages grouped by locator, locators in first-seen order
    pub fn grouped(&self) -> Vec<(FieldPath, Vec<String>)> {
        let mut groups: Vec<(FieldPath, Vec<String>)> = Vec::new();
        for violation in &self.violations {
            match groups.iter_mut().find(|(path, _)| *path == violation.path) {
                Some((_, messages)) => messages.push(violation.message.clone()),
                None => groups.push((violation.path, vec![violation.message.clone()])),
            }
        }
        groups
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.path, violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_display() {
        assert_eq!(FieldPath::JobKind.to_string(), "jobKind");
        assert_eq!(FieldPath::CronExpression.to_string(), "cronExpression");
        assert_eq!(FieldPath::Fields.to_string(), "fields");
        assert_eq!(FieldPath::FieldValue(1).to_string(), "fields[1].value");
    }

    #[test]
    fn test_grouped_keeps_first_seen_order() {
        let mut errors = ValidationErrors::new();
        errors.push(FieldPath::CronExpression, "Cron expression is required");
        errors.push(FieldPath::Fields, "Required field [a] not provided");
        errors.push(FieldPath::Fields, "Required field [b] not provided");

        let grouped = errors.grouped();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, FieldPath::CronExpression);
        assert_eq!(grouped[1].1.len(), 2);
        assert_eq!(errors.messages_at(FieldPath::Fields)[1], "Required field [b] not provided");
    }

    #[test]
    fn test_into_result_and_display() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.push(FieldPath::JobKind, "Cron job not found");
        assert_eq!(errors.to_string(), "jobKind: Cron job not found");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json[0]["path"], "jobKind");
        assert!(errors.into_result().is_err());
    }
}
