//! Declarative step schemas.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde_json::Value;

use super::rules::Rule;
use crate::model::{CustomerType, Document};
use crate::steps::StepId;

pub const GENDERS: &[&str] = &["male", "female", "other", "undisclosed"];
pub const OWNERSHIP_STATUSES: &[&str] = &["owner", "rental", "leased", "other"];
pub const LANGUAGES: &[&str] = &["en", "fr", "de", "es", "ar"];
pub const CONTACT_METHODS: &[&str] = &["email", "phone", "sms"];

/// Rules for one field, checked in order; the first failure is reported.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub path: &'static str,
    pub label: &'static str,
    pub rules: Vec<Rule>,
}

impl FieldRule {
    pub fn new(path: &'static str, label: &'static str) -> Self {
        Self {
            path,
            label,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    fn first_failure(&self, source: &impl FieldSource) -> Option<String> {
        let value = source.lookup(self.path);
        self.rules.iter().find_map(|rule| {
            let other = match rule {
                Rule::Matches(path) => source.lookup(path),
                _ => None,
            };
            rule.check(self.label, value.as_deref(), other.as_deref())
        })
    }
}

/// Anything a schema can read fields from.
pub trait FieldSource {
    fn lookup(&self, path: &str) -> Option<Cow<'_, Value>>;
}

impl FieldSource for Document {
    fn lookup(&self, path: &str) -> Option<Cow<'_, Value>> {
        match path {
            "addresses" => serde_json::to_value(&self.addresses).ok().map(Cow::Owned),
            "linkedAccounts" => serde_json::to_value(&self.linked_accounts)
                .ok()
                .map(Cow::Owned),
            _ => self.get(path).map(Cow::Borrowed),
        }
    }
}

impl FieldSource for Value {
    fn lookup(&self, path: &str) -> Option<Cow<'_, Value>> {
        let mut cursor = self;
        for segment in path.split('.') {
            cursor = cursor.get(segment)?;
        }
        Some(Cow::Borrowed(cursor))
    }
}

/// The rules of one step (or one list item form).
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    pub fields: Vec<FieldRule>,
}

impl StepSchema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    /// Run every field's rules; one message per failing field.
    pub fn check(&self, source: &impl FieldSource) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|field| {
                field
                    .first_failure(source)
                    .map(|msg| (field.path.to_string(), msg))
            })
            .collect()
    }
}

fn number(min: Option<f64>, max: Option<f64>) -> Rule {
    Rule::Number { min, max }
}

/// Schema for a step of the given customer type's plan.
pub fn schema_for(step: StepId, customer_type: CustomerType) -> StepSchema {
    let fields = match step {
        StepId::Identity => {
            let mut fields = vec![
                FieldRule::new("firstName", "First name").required(),
                FieldRule::new("lastName", "Last name").required(),
                FieldRule::new("email", "Email").required().rule(Rule::Email),
                FieldRule::new("phone", "Phone").required().rule(Rule::Phone),
                FieldRule::new("password", "Password")
                    .required()
                    .rule(Rule::MinLength(8)),
                FieldRule::new("confirmPassword", "Password confirmation")
                    .required()
                    .rule(Rule::Matches("password")),
            ];
            match customer_type {
                CustomerType::Domestic => {
                    fields.push(FieldRule::new("dateOfBirth", "Date of birth").rule(Rule::Date));
                }
                CustomerType::Business => {
                    fields.push(FieldRule::new("companyName", "Company name").required());
                }
            }
            fields
        }
        StepId::PersonalInfo => vec![
            FieldRule::new("personalInfo.gender", "Gender")
                .required()
                .rule(Rule::OneOf(GENDERS)),
            FieldRule::new("personalInfo.nationality", "Nationality").required(),
        ],
        StepId::BusinessInfo => vec![
            FieldRule::new("businessInfo.registrationNumber", "Registration number").required(),
            FieldRule::new("businessInfo.industry", "Industry").required(),
            FieldRule::new("businessInfo.employeeCount", "Employee count")
                .rule(number(Some(1.0), None)),
        ],
        StepId::Addresses => vec![FieldRule::new("addresses", "Addresses").rule(Rule::MinItems(1))],
        StepId::BuildingAccess => vec![
            FieldRule::new("buildingAccessInfo.ownershipStatus", "Ownership status")
                .required()
                .rule(Rule::OneOf(OWNERSHIP_STATUSES)),
            FieldRule::new("buildingAccessInfo.floor", "Floor").rule(number(None, None)),
            FieldRule::new("buildingAccessInfo.moveInDate", "Move-in date").rule(Rule::Date),
        ],
        StepId::Preferences => vec![
            FieldRule::new("preferences.language", "Language")
                .required()
                .rule(Rule::OneOf(LANGUAGES)),
            FieldRule::new("preferences.contactMethod", "Contact method")
                .required()
                .rule(Rule::OneOf(CONTACT_METHODS)),
        ],
        StepId::Security => vec![
            FieldRule::new("security.securityAmount", "Security amount")
                .required()
                .rule(number(Some(0.0), None)),
            FieldRule::new("security.depositDate", "Deposit date")
                .required()
                .rule(Rule::Date),
        ],
        StepId::ServicePlan => vec![
            FieldRule::new("servicePlan.planName", "Plan name").required(),
            FieldRule::new("servicePlan.sellingPrice", "Selling price").rule(number(Some(0.0), None)),
            FieldRule::new("servicePlan.discountPercent", "Discount percent")
                .rule(number(Some(0.0), Some(100.0))),
            FieldRule::new("servicePlan.salePrice", "Sale price").rule(number(Some(0.0), None)),
        ],
        StepId::LinkedAccounts => Vec::new(),
    };
    StepSchema::new(fields)
}

/// Structural rules for an address entry.
pub fn address_schema() -> StepSchema {
    StepSchema::new(vec![
        FieldRule::new("title", "Title").required(),
        FieldRule::new("street", "Street").required(),
        FieldRule::new("city", "City").required(),
        FieldRule::new("country", "Country").required(),
    ])
}

/// Structural rules for a linked account entry.
pub fn linked_account_schema() -> StepSchema {
    StepSchema::new(vec![
        FieldRule::new("provider", "Provider").required(),
        FieldRule::new("handle", "Handle").required(),
    ])
}
