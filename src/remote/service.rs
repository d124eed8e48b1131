//! Resource service interfaces consumed by the wizard.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::RemoteError;
use crate::model::category::RemoteCategory;
use crate::model::{
    Address, CategoryRef, CollectionItem, CustomerType, Document, LinkedAccount,
    RemoteProfileHandle,
};

/// The root profile resource.
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Create the root profile. Called once per session.
    async fn create(&self, payload: &Value) -> Result<RemoteProfileHandle, RemoteError>;

    /// PATCH one 1:1 section of an existing profile.
    async fn patch_section(
        &self,
        profile_id: &str,
        section: &str,
        payload: &Value,
    ) -> Result<(), RemoteError>;

    /// Fetch a full profile.
    async fn get_by_id(&self, profile_id: &str) -> Result<RemoteProfile, RemoteError>;
}

/// A list-valued sub-resource owned by a profile (addresses, linked accounts).
#[async_trait]
pub trait CollectionService<T: CollectionItem>: Send + Sync {
    async fn list(&self, profile_id: &str) -> Result<Vec<T>, RemoteError>;

    async fn create(&self, profile_id: &str, payload: &Value) -> Result<T, RemoteError>;

    async fn update(&self, profile_id: &str, item_id: &str, payload: &Value)
    -> Result<T, RemoteError>;

    async fn delete(&self, profile_id: &str, item_id: &str) -> Result<(), RemoteError>;
}

/// A profile as returned by the profile service.
///
/// The category arrives either as an id or as an object and is resolved to a
/// [`CategoryRef`] here, at the loading boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub customer_type: CustomerType,
    #[serde(default, deserialize_with = "resolve_category")]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub linked_accounts: Vec<LinkedAccount>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn resolve_category<'de, D>(deserializer: D) -> Result<Option<CategoryRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RemoteCategory>::deserialize(deserializer)?.map(CategoryRef::from))
}

impl RemoteProfile {
    pub fn handle(&self) -> RemoteProfileHandle {
        RemoteProfileHandle::new(self.id.clone())
    }

    /// Turn the remote profile into a draft document, merging in the
    /// default sections the server omitted.
    pub fn into_document(self) -> Document {
        let mut document = Document::with_defaults(self.customer_type);
        for (key, value) in self.fields {
            document.fields.insert(key, value);
        }
        document.category = self.category;
        document.addresses = self.addresses;
        document.linked_accounts = self.linked_accounts;
        document
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn remote_profile_resolves_category_object() {
        let profile: RemoteProfile = serde_json::from_value(json!({
            "_id": "p-1",
            "customerType": "business",
            "category": {"id": "cat-2", "name": "Hospitality"},
            "companyName": "Inn Ltd",
            "preferences": {"language": "fr"},
            "addresses": [{"id": "addr-1", "street": "1 Quai", "city": "Lyon"}]
        }))
        .unwrap();
        assert_eq!(profile.id, "p-1");
        assert_eq!(
            profile.category,
            Some(CategoryRef::Resolved {
                id: "cat-2".into(),
                name: "Hospitality".into()
            })
        );

        let doc = profile.into_document();
        assert_eq!(doc.text("companyName"), Some("Inn Ltd"));
        assert_eq!(doc.get("preferences.language"), Some(&json!("fr")));
        assert!(doc.fields.contains_key("businessInfo"));
        assert_eq!(doc.addresses[0].server_id(), Some("addr-1"));
        assert_eq!(doc.addresses[0].concatenated_address(), "1 Quai, Lyon");
    }

    #[test]
    fn remote_profile_category_as_plain_id() {
        let profile: RemoteProfile = serde_json::from_value(json!({
            "id": "p-2",
            "customerType": "domestic",
            "category": "cat-9"
        }))
        .unwrap();
        assert_eq!(
            profile.category,
            Some(CategoryRef::Unresolved { id: "cat-9".into() })
        );
        assert!(profile.linked_accounts.is_empty());
    }

    #[test]
    fn remote_profile_without_category() {
        let profile: RemoteProfile = serde_json::from_value(json!({
            "id": "p-3",
            "customerType": "domestic",
            "category": null
        }))
        .unwrap();
        assert!(profile.category.is_none());
    }
}
