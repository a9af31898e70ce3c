//! Form validation against a job kind schema.

use std::sync::Arc;

use tracing::debug;

use cron_types::{JobKindDefinition, TaskConfigurationForm};

use super::{AutocompleteValidators, FieldPath, FieldTypeValidators, ValidationErrors};
use crate::schedule::validate_cron_expression;
use crate::{JobKindRegistry, SchedulerError};

/// Checks submitted forms against the job kind catalog.
///
/// Validation never fails fast: every applicable violation is recorded.
#[derive(Debug, Clone)]
pub struct ConfigurationValidator {
    job_kinds: Arc<JobKindRegistry>,
    types: FieldTypeValidators,
    autocomplete: AutocompleteValidators,
}

impl ConfigurationValidator {
    /// Assemble a validator.
    ///
    /// # Errors
    ///
    /// Fails when any schema in the catalog declares a custom type or an
    /// autocomplete source that has no registered validator.
    pub fn new(
        job_kinds: Arc<JobKindRegistry>,
        types: FieldTypeValidators,
        autocomplete: AutocompleteValidators,
    ) -> Result<Self, SchedulerError> {
        for definition in job_kinds.definitions() {
            for field in &definition.fields {
                if !types.supports(&field.field_type) {
                    return Err(SchedulerError::UnknownFieldType {
                        job_kind: definition.id.clone(),
                        field: field.name.clone(),
                        field_type: field.field_type.to_string(),
                    });
                }
                if let Some(source) = &field.autocomplete {
                    if !autocomplete.supports(source) {
                        return Err(SchedulerError::UnknownAutocompleteSource {
                            job_kind: definition.id.clone(),
                            field: field.name.clone(),
                            source_id: source.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            job_kinds,
            types,
            autocomplete,
        })
    }

    pub fn job_kinds(&self) -> &Arc<JobKindRegistry> {
        &self.job_kinds
    }

    /// Validate a form, returning every violation found.
    pub fn validate(&self, form: &TaskConfigurationForm) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let Some(definition) = self.job_kinds.definition(form.job_kind.trim()) else {
            errors.push(FieldPath::JobKind, "Cron job not found");
            return Err(errors);
        };

        check_cron_expression(form, &mut errors);
        self.check_fields(definition, form, &mut errors);

        if !errors.is_empty() {
            debug!(job_kind = %definition.id, violations = errors.len(), "Form rejected");
        }
        errors.into_result()
    }

    fn check_fields(
        &self,
        definition: &JobKindDefinition,
        form: &TaskConfigurationForm,
        errors: &mut ValidationErrors,
    ) {
        for field in &definition.fields {
            let Some(index) = form.fields.iter().position(|f| f.name == field.name) else {
                if field.required {
                    errors.push(
                        FieldPath::Fields,
                        format!("Required field [{}] not provided", field.name),
                    );
                }
                continue;
            };
            let value = form.fields[index].value.as_str();
            let path = FieldPath::FieldValue(index);

            if field.required && value.trim().is_empty() {
                errors.push(path, format!("Required field value [{}] not provided", field.name));
                continue;
            }

            // Unsupported types were rejected in `new`
            if self.types.check(&field.field_type, value) != Some(true) {
                errors.push(
                    path,
                    format!(
                        "Invalid value [{}] type provided. [{}] was expected.",
                        value, field.field_type
                    ),
                );
                continue;
            }

            if let Some(source) = &field.autocomplete {
                if self.autocomplete.check(source, value) != Some(true) {
                    errors.push(
                        path,
                        format!(
                            "Invalid value [{}] provided. Possible values do not contain this value.",
                            value
                        ),
                    );
                }
            }
        }
    }
}

/// At most one cron violation is recorded, checked in this order:
/// expression forbidden, expression missing, expression unparsable.
fn check_cron_expression(form: &TaskConfigurationForm, errors: &mut ValidationErrors) {
    let dormant_after_firing = form.immediate_execution && form.one_time_execution;

    match form.cron_expression() {
        Some(_) if dormant_after_firing => errors.push(
            FieldPath::CronExpression,
            "Cron expression should not be provided when both immediateExecution and oneTimeExecution are set to true",
        ),
        None if dormant_after_firing => {}
        None => errors.push(FieldPath::CronExpression, "Cron expression is required"),
        Some(expr) => {
            if validate_cron_expression(expr).is_err() {
                errors.push(FieldPath::CronExpression, "Cron expression is invalid");
            }
        }
    }
}
