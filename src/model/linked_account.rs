//! Linked (external) accounts attached to a profile.

use serde::{Deserialize, Serialize};

/// Who may see a linked account on the profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    ContactsOnly,
}

/// Verification state of a linked account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

/// User-edited linked account fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkedAccountFields {
    /// Service name, e.g. "google", "linkedin".
    pub provider: String,
    /// Account handle or email on that service.
    pub handle: String,
    pub visibility: Visibility,
    pub status: AccountStatus,
}

/// A linked account in the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(flatten)]
    pub fields: LinkedAccountFields,
}

impl LinkedAccount {
    pub fn new(fields: LinkedAccountFields) -> Self {
        Self {
            server_id: None,
            fields,
        }
    }

    pub fn with_server_id(mut self, id: impl Into<String>) -> Self {
        self.server_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_snake_case() {
        let json = serde_json::to_value(Visibility::ContactsOnly).unwrap();
        assert_eq!(json, "contacts_only");
        let status: AccountStatus = serde_json::from_str("\"suspended\"").unwrap();
        assert_eq!(status, AccountStatus::Suspended);
    }

    #[test]
    fn server_response_maps_id() {
        let json = serde_json::json!({
            "id": "acc-3",
            "provider": "linkedin",
            "handle": "jdoe",
            "visibility": "public",
            "status": "active"
        });
        let account: LinkedAccount = serde_json::from_value(json).unwrap();
        assert_eq!(account.server_id.as_deref(), Some("acc-3"));
        assert_eq!(account.fields.visibility, Visibility::Public);
        assert_eq!(account.fields.status, AccountStatus::Active);
    }

    #[test]
    fn missing_enums_default() {
        let account: LinkedAccount =
            serde_json::from_value(serde_json::json!({"provider": "google"})).unwrap();
        assert_eq!(account.fields.visibility, Visibility::Private);
        assert_eq!(account.fields.status, AccountStatus::Pending);
        assert!(account.server_id.is_none());
    }
}
