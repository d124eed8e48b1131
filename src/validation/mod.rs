//! Per-step declarative schemas over the draft document.
//!
//! Validation is pure: it reads the document and returns a field → message
//! map, one message per field (the first failing rule wins).

pub mod rules;
pub mod schema;

use std::collections::BTreeMap;

use serde::Serialize;

pub use rules::Rule;
pub use schema::{FieldRule, FieldSource, StepSchema, schema_for};

use crate::model::{AddressFields, CustomerType, Document, LinkedAccountFields};
use crate::steps::plan_for;

/// Outcome of validating one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationReport {
    fn from_errors(field_errors: BTreeMap<String, String>) -> Self {
        Self {
            is_valid: field_errors.is_empty(),
            field_errors,
        }
    }
}

/// Validate step `step_index` of `customer_type`'s plan against `document`.
///
/// An index past the end of the plan has no rules and is reported valid.
pub fn validate(
    customer_type: CustomerType,
    step_index: usize,
    document: &Document,
) -> ValidationReport {
    let errors = plan_for(customer_type)
        .get(step_index)
        .map(|step| schema_for(*step, customer_type).check(document))
        .unwrap_or_default();
    ValidationReport::from_errors(errors)
}

/// Structural validation of an address before it is sent anywhere.
pub fn validate_address(fields: &AddressFields) -> ValidationReport {
    let value = serde_json::to_value(fields).unwrap_or_default();
    ValidationReport::from_errors(schema::address_schema().check(&value))
}

/// Structural validation of a linked account before it is sent anywhere.
pub fn validate_linked_account(fields: &LinkedAccountFields) -> ValidationReport {
    let value = serde_json::to_value(fields).unwrap_or_default();
    ValidationReport::from_errors(schema::linked_account_schema().check(&value))
}
