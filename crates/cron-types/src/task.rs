//! Task configuration types.
//!
//! A `TaskConfigurationForm` is what callers submit; once validated it becomes a
//! `TaskConfiguration`, the persisted source of truth for one scheduled
//! invocation of a job kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single submitted parameter (name/value pair) of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskField {
    /// Parameter name, matched against the job kind's field definitions
    pub name: String,

    /// Raw submitted value
    #[serde(default)]
    pub value: String,
}

impl TaskField {
    /// Create a new field
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A proposed task configuration as submitted by a caller.
///
/// Fields keep their submission order so validation errors can point at
/// a specific position (`fields[1].value`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfigurationForm {
    /// Job kind identifier
    #[serde(default)]
    pub job_kind: String,

    /// Display name (defaults to the assigned id when empty)
    #[serde(default)]
    pub name: String,

    /// Cron expression, absent for immediate one-shot tasks
    #[serde(default)]
    pub cron_expression: Option<String>,

    #[serde(default)]
    pub one_time_execution: bool,

    #[serde(default)]
    pub immediate_execution: bool,

    /// Job-kind specific parameters
    #[serde(default)]
    pub fields: Vec<TaskField>,
}

impl TaskConfigurationForm {
    /// Create a new form for the given job kind
    pub fn new(job_kind: impl Into<String>) -> Self {
        Self {
            job_kind: job_kind.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cron_expression(mut self, expr: impl Into<String>) -> Self {
        self.cron_expression = Some(expr.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(TaskField::new(name, value));
        self
    }

    pub fn with_immediate_execution(mut self, immediate: bool) -> Self {
        self.immediate_execution = immediate;
        self
    }

    pub fn with_one_time_execution(mut self, one_time: bool) -> Self {
        self.one_time_execution = one_time;
        self
    }

    /// Cron expression with surrounding whitespace removed, `None` when blank.
    pub fn cron_expression(&self) -> Option<&str> {
        non_blank(self.cron_expression.as_deref())
    }

    /// Convert an accepted form into a configuration stored under `id`.
    ///
    /// Later duplicates of a field name win, matching map semantics.
    pub fn into_configuration(self, id: impl Into<String>) -> TaskConfiguration {
        let id = id.into();
        let name = if self.name.trim().is_empty() {
            id.clone()
        } else {
            self.name
        };
        let cron_expression = non_blank(self.cron_expression.as_deref()).map(str::to_string);

        TaskConfiguration {
            id,
            name,
            job_kind: self.job_kind.trim().to_string(),
            cron_expression,
            one_time_execution: self.one_time_execution,
            immediate_execution: self.immediate_execution,
            properties: self
                .fields
                .into_iter()
                .map(|field| (field.name, field.value))
                .collect(),
        }
    }
}

/// A persisted task configuration.
///
/// Updates replace the whole configuration under the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfiguration {
    /// Unique identifier (caller-supplied or generated ULID)
    pub id: String,

    /// Display name
    pub name: String,

    /// Identifier of the job kind to run
    pub job_kind: String,

    /// Cron expression, `None` for immediate one-shot tasks
    #[serde(default)]
    pub cron_expression: Option<String>,

    #[serde(default)]
    pub one_time_execution: bool,

    #[serde(default)]
    pub immediate_execution: bool,

    /// Job-kind specific parameters
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl TaskConfiguration {
    /// Create a configuration with no schedule and no properties
    pub fn new(id: impl Into<String>, name: impl Into<String>, job_kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            job_kind: job_kind.into(),
            cron_expression: None,
            one_time_execution: false,
            immediate_execution: false,
            properties: BTreeMap::new(),
        }
    }

    /// Generate a fresh configuration id
    pub fn generate_id() -> String {
        ulid::Ulid::new().to_string()
    }

    pub fn with_cron_expression(mut self, expr: impl Into<String>) -> Self {
        self.cron_expression = Some(expr.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_immediate_execution(mut self, immediate: bool) -> Self {
        self.immediate_execution = immediate;
        self
    }

    pub fn with_one_time_execution(mut self, one_time: bool) -> Self {
        self.one_time_execution = one_time;
        self
    }

    /// Cron expression with surrounding whitespace removed, `None` when blank.
    pub fn cron_expression(&self) -> Option<&str> {
        non_blank(self.cron_expression.as_deref())
    }

    /// Look up a property value
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn should_execute_immediately(&self) -> bool {
        self.immediate_execution
    }

    /// Whether a standing cron trigger must be registered.
    ///
    /// Only the immediate + one-time combination stays dormant after firing.
    pub fn should_register_recurring_trigger(&self) -> bool {
        !self.immediate_execution || !self.one_time_execution
    }

    /// Rebuild the submission form, fields in property order.
    pub fn to_form(&self) -> TaskConfigurationForm {
        TaskConfigurationForm {
            job_kind: self.job_kind.clone(),
            name: self.name.clone(),
            cron_expression: self.cron_expression.clone(),
            one_time_execution: self.one_time_execution,
            immediate_execution: self.immediate_execution,
            fields: self
                .properties
                .iter()
                .map(|(name, value)| TaskField::new(name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
