//! Address entries and the derived `concatenatedAddress` cache.

use serde::{Deserialize, Serialize};

/// Separator used when joining structural fields.
pub const ADDRESS_SEPARATOR: &str = ", ";

/// Structural (user-edited) address fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressFields {
    /// Label such as "Home" or "Head office". Not part of the joined address.
    pub title: String,
    pub street: String,
    pub building: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

impl AddressFields {
    /// Join the non-empty structural fields in display order.
    pub fn concatenate(&self) -> String {
        [
            &self.street,
            &self.building,
            &self.city,
            &self.region,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(ADDRESS_SEPARATOR)
    }

    /// Set one field by its camelCase name. Returns false for unknown names.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "title" => &mut self.title,
            "street" => &mut self.street,
            "building" => &mut self.building,
            "city" => &mut self.city,
            "region" => &mut self.region,
            "postalCode" => &mut self.postal_code,
            "country" => &mut self.country,
            _ => return false,
        };
        *slot = value.into();
        true
    }
}

/// An address in the draft.
///
/// `concatenated_address` is only ever computed from the structural fields:
/// there is no setter, and it is recomputed when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AddressWire", into = "AddressWire")]
pub struct Address {
    server_id: Option<String>,
    fields: AddressFields,
    concatenated_address: String,
}

impl Address {
    /// A new, not yet synced address.
    pub fn new(fields: AddressFields) -> Self {
        let concatenated_address = fields.concatenate();
        Self {
            server_id: None,
            fields,
            concatenated_address,
        }
    }

    /// Attach the id assigned by the address service.
    pub fn with_server_id(mut self, id: impl Into<String>) -> Self {
        self.server_id = Some(id.into());
        self
    }

    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    pub(crate) fn set_server_id(&mut self, id: String) {
        self.server_id = Some(id);
    }

    pub fn fields(&self) -> &AddressFields {
        &self.fields
    }

    pub fn concatenated_address(&self) -> &str {
        &self.concatenated_address
    }

    /// Replace all structural fields.
    pub fn set_fields(&mut self, fields: AddressFields) {
        self.fields = fields;
        self.concatenated_address = self.fields.concatenate();
    }

    /// Edit a single structural field by name.
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        let known = self.fields.set(field, value);
        if known {
            self.concatenated_address = self.fields.concatenate();
        }
        known
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressWire {
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    server_id: Option<String>,
    #[serde(flatten)]
    fields: AddressFields,
    #[serde(default)]
    concatenated_address: String,
}

impl From<AddressWire> for Address {
    fn from(wire: AddressWire) -> Self {
        let mut address = Address::new(wire.fields);
        address.server_id = wire.server_id;
        address
    }
}

impl From<Address> for AddressWire {
    fn from(address: Address) -> Self {
        Self {
            server_id: address.server_id,
            fields: address.fields,
            concatenated_address: address.concatenated_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AddressFields {
        AddressFields {
            title: "Home".into(),
            street: "12 Rue Lafayette".into(),
            building: String::new(),
            city: "Paris".into(),
            region: "  ".into(),
            postal_code: "75009".into(),
            country: "France".into(),
        }
    }

    #[test]
    fn concatenation_skips_empty_fields_and_title() {
        let address = Address::new(sample());
        assert_eq!(
            address.concatenated_address(),
            "12 Rue Lafayette, Paris, 75009, France"
        );
    }

    #[test]
    fn structural_edit_recomputes() {
        let mut address = Address::new(sample());
        assert!(address.set_field("building", "Bât. B"));
        assert_eq!(
            address.concatenated_address(),
            "12 Rue Lafayette, Bât. B, Paris, 75009, France"
        );
        assert!(!address.set_field("concatenatedAddress", "hand-set"));
        assert!(!address.concatenated_address().contains("hand-set"));
    }

    #[test]
    fn title_edit_does_not_change_join() {
        let mut address = Address::new(sample());
        let before = address.concatenated_address().to_string();
        address.set_field("title", "Office");
        assert_eq!(address.concatenated_address(), before);
    }

    #[test]
    fn deserialize_ignores_stale_cache_and_accepts_server_id() {
        let json = serde_json::json!({
            "id": "addr-1",
            "street": "1 Main St",
            "city": "Springfield",
            "concatenatedAddress": "stale value"
        });
        let address: Address = serde_json::from_value(json).unwrap();
        assert_eq!(address.server_id(), Some("addr-1"));
        assert_eq!(address.concatenated_address(), "1 Main St, Springfield");
    }

    #[test]
    fn serialized_form_uses_server_id_key() {
        let address = Address::new(sample()).with_server_id("addr-9");
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["serverId"], "addr-9");
        assert_eq!(json["postalCode"], "75009");
        assert_eq!(
            json["concatenatedAddress"],
            "12 Rue Lafayette, Paris, 75009, France"
        );
    }
}
