//! Category references.
//!
//! The profile service returns a category either as a bare id or as an
//! `{id, name}` object. That ambiguity is resolved once, when a remote
//! profile is deserialized, and everything downstream matches on
//! [`CategoryRef`].

use serde::{Deserialize, Serialize};

/// A category selected for the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CategoryRef {
    /// Only the id is known (e.g. chosen from a cached list or returned bare).
    Unresolved { id: String },
    /// Id and display name are known.
    Resolved { id: String, name: String },
}

impl CategoryRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Unresolved { id } | Self::Resolved { id, .. } => id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Unresolved { .. } => None,
            Self::Resolved { name, .. } => Some(name),
        }
    }
}

/// Wire shape accepted from the profile service only.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RemoteCategory {
    Id(String),
    Object {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<RemoteCategory> for CategoryRef {
    fn from(raw: RemoteCategory) -> Self {
        match raw {
            RemoteCategory::Id(id) => Self::Unresolved { id },
            RemoteCategory::Object { id, name: Some(name) } if !name.is_empty() => {
                Self::Resolved { id, name }
            }
            RemoteCategory::Object { id, .. } => Self::Unresolved { id },
        }
    }
}
