//! The draft profile document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Address, CategoryRef, CustomerType, LinkedAccount};
use crate::draft::path::{self, FieldPath};
use crate::error::PathError;

/// Top-level keys that are written through typed operations only.
pub const RESERVED_KEYS: &[&str] = &["addresses", "linkedAccounts", "category"];

/// Profile document built across the wizard steps.
///
/// Identity fields live at the top level; 1:1 sections (`personalInfo`,
/// `buildingAccessInfo`, `preferences`, ...) are nested objects reached by
/// dotted paths. The list sections are typed and always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub linked_accounts: Vec<LinkedAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRef>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// A fresh document with the default sections for `customer_type`.
    pub fn with_defaults(customer_type: CustomerType) -> Self {
        let info_section = match customer_type {
            CustomerType::Domestic => "personalInfo",
            CustomerType::Business => "businessInfo",
        };
        let mut fields = Map::new();
        fields.insert(info_section.to_string(), json!({}));
        fields.insert("buildingAccessInfo".to_string(), json!({}));
        fields.insert(
            "preferences".to_string(),
            json!({ "language": "en", "contactMethod": "email", "newsletter": false }),
        );
        fields.insert("security".to_string(), json!({}));
        fields.insert(
            "servicePlan".to_string(),
            json!({
                "sellingPrice": 0,
                "discountPercent": 0,
                "discountAmount": 0,
                "salePrice": 0
            }),
        );
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Read a value by dotted path. Invalid paths read as absent.
    pub fn get(&self, raw: &str) -> Option<&Value> {
        let path = FieldPath::parse(raw).ok()?;
        self.get_path(&path)
    }

    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        path::get(&self.fields, path)
    }

    /// String value at `raw`, trimmed; empty strings read as absent.
    pub fn text(&self, raw: &str) -> Option<&str> {
        self.get(raw)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Write a value by dotted path. List sections and the category are
    /// rejected: they have their own operations.
    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> Result<Option<Value>, PathError> {
        if RESERVED_KEYS.contains(&path.root()) {
            return Err(PathError::Reserved(path.root().to_string()));
        }
        Ok(path::set(&mut self.fields, path, value))
    }

    /// A copy of a nested section, or an empty object if absent.
    pub fn section(&self, key: &str) -> Value {
        match self.fields.get(key) {
            Some(value @ Value::Object(_)) => value.clone(),
            _ => Value::Object(Map::new()),
        }
    }
}
