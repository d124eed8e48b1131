//! Profile data model: the draft document and its list-valued sections.

pub mod address;
pub mod category;
pub mod document;
pub mod linked_account;

pub use address::{Address, AddressFields};
pub use category::CategoryRef;
pub use document::Document;
pub use linked_account::{AccountStatus, LinkedAccount, LinkedAccountFields, Visibility};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{self, ValidationReport};

/// Which kind of profile the wizard is building.
///
/// Selecting a customer type creates a fresh document and picks the step
/// plan, see [`crate::steps::plan_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Domestic,
    Business,
}

impl std::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domestic => write!(f, "domestic"),
            Self::Business => write!(f, "business"),
        }
    }
}

impl std::str::FromStr for CustomerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domestic" => Ok(Self::Domestic),
            "business" => Ok(Self::Business),
            other => Err(format!("unknown customer type: {other}")),
        }
    }
}

/// Reference to the root profile created remotely at step 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfileHandle {
    pub profile_id: String,
}

impl RemoteProfileHandle {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
        }
    }
}

/// The two list-valued sub-resources owned by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Addresses,
    LinkedAccounts,
}

impl ListKind {
    /// Key of the list inside the document.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Addresses => "addresses",
            Self::LinkedAccounts => "linkedAccounts",
        }
    }

    /// Path segment of the sub-resource collection on the profile service.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Addresses => "addresses",
            Self::LinkedAccounts => "linked-accounts",
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource())
    }
}

/// An entry of a list-valued sub-resource, as kept in the document.
pub trait CollectionItem:
    Clone + Send + Sync + Serialize + DeserializeOwned + std::fmt::Debug + 'static
{
    /// The user-edited part of the item.
    type Fields: Clone + Send + Sync + Serialize + std::fmt::Debug + 'static;

    const KIND: ListKind;

    fn from_fields(fields: Self::Fields) -> Self;

    fn server_id(&self) -> Option<&str>;

    fn fields(&self) -> &Self::Fields;

    /// Fill in the server id when a response omitted it.
    fn assign_server_id(&mut self, id: String);

    /// Structural checks run before any remote call.
    fn validate(fields: &Self::Fields) -> ValidationReport;

    fn list(document: &Document) -> &[Self];

    fn list_mut(document: &mut Document) -> &mut Vec<Self>;

    /// Body sent to the service: the item without its server id.
    fn payload(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("serverId");
        }
        value
    }
}

impl CollectionItem for Address {
    type Fields = AddressFields;

    const KIND: ListKind = ListKind::Addresses;

    fn from_fields(fields: AddressFields) -> Self {
        Address::new(fields)
    }

    fn server_id(&self) -> Option<&str> {
        Address::server_id(self)
    }

    fn fields(&self) -> &AddressFields {
        Address::fields(self)
    }

    fn assign_server_id(&mut self, id: String) {
        self.set_server_id(id);
    }

    fn validate(fields: &AddressFields) -> ValidationReport {
        validation::validate_address(fields)
    }

    fn list(document: &Document) -> &[Self] {
        &document.addresses
    }

    fn list_mut(document: &mut Document) -> &mut Vec<Self> {
        &mut document.addresses
    }
}

impl CollectionItem for LinkedAccount {
    type Fields = LinkedAccountFields;

    const KIND: ListKind = ListKind::LinkedAccounts;

    fn from_fields(fields: LinkedAccountFields) -> Self {
        LinkedAccount::new(fields)
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn fields(&self) -> &LinkedAccountFields {
        &self.fields
    }

    fn assign_server_id(&mut self, id: String) {
        self.server_id = Some(id);
    }

    fn validate(fields: &LinkedAccountFields) -> ValidationReport {
        validation::validate_linked_account(fields)
    }

    fn list(document: &Document) -> &[Self] {
        &document.linked_accounts
    }

    fn list_mut(document: &mut Document) -> &mut Vec<Self> {
        &mut document.linked_accounts
    }
}
