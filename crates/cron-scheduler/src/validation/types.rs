//! Field type validators.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cron_types::FieldType;

use super::ValuePredicate;

/// Type check per declared field type.
///
/// Built-in types are always available; custom tags must be registered
/// before the `ConfigurationValidator` is assembled.
#[derive(Clone, Default)]
pub struct FieldTypeValidators {
    custom: HashMap<String, ValuePredicate>,
}

impl FieldTypeValidators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate for a custom type tag, replacing any earlier one
    pub fn register<F>(&mut self, tag: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(tag.into(), Arc::new(predicate));
    }

    pub fn with<F>(mut self, tag: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.register(tag, predicate);
        self
    }

    /// Whether `field_type` can be checked
    pub fn supports(&self, field_type: &FieldType) -> bool {
        match field_type {
            FieldType::Custom(tag) => self.custom.contains_key(tag),
            _ => true,
        }
    }

    /// Check `value` against `field_type`; `None` for an unregistered custom tag.
    pub fn check(&self, field_type: &FieldType, value: &str) -> Option<bool> {
        match field_type {
            FieldType::String => Some(true),
            FieldType::Int => Some(value.parse::<i32>().is_ok()),
            FieldType::Boolean => {
                Some(value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"))
            }
            FieldType::Custom(tag) => self.custom.get(tag).map(|predicate| predicate(value)),
        }
    }
}

impl fmt::Debug for FieldTypeValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTypeValidators")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let validators = FieldTypeValidators::new();

        assert_eq!(validators.check(&FieldType::String, ""), Some(true));
        assert_eq!(validators.check(&FieldType::Int, "50"), Some(true));
        assert_eq!(validators.check(&FieldType::Int, "-7"), Some(true));
        assert_eq!(validators.check(&FieldType::Int, "piecdziesiat"), Some(false));
        assert_eq!(validators.check(&FieldType::Int, "99999999999"), Some(false));
        assert_eq!(validators.check(&FieldType::Int, ""), Some(false));
        assert_eq!(validators.check(&FieldType::Boolean, "TRUE"), Some(true));
        assert_eq!(validators.check(&FieldType::Boolean, "false"), Some(true));
        assert_eq!(validators.check(&FieldType::Boolean, "yes"), Some(false));
    }

    #[test]
    fn test_custom_type() {
        let duration = FieldType::Custom("duration".to_string());
        let validators = FieldTypeValidators::new();
        assert!(!validators.supports(&duration));
        assert_eq!(validators.check(&duration, "5s"), None);

        let validators = validators.with("duration", |v| v.ends_with('s'));
        assert!(validators.supports(&duration));
        assert_eq!(validators.check(&duration, "5s"), Some(true));
        assert_eq!(validators.check(&duration, "5m"), Some(false));
    }
}
