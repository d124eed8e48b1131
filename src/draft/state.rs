//! The wizard's single state holder, persisted on every change.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::path::FieldPath;
use super::store::LocalStore;
use crate::error::{PathError, StoreError, WizardError};
use crate::model::{CustomerType, Document, RemoteProfileHandle};

/// Persisted wizard state.
///
/// Stored as one JSON blob per session:
/// `{customerType, currentStep, data, errors, profileId?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    /// `None` until the user picks a customer type.
    pub customer_type: Option<CustomerType>,
    pub current_step: usize,
    #[serde(rename = "data", default)]
    pub document: Document,
    #[serde(rename = "errors", default)]
    pub field_errors: BTreeMap<String, String>,
    /// Id of the root profile once it was created remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
}

impl WizardState {
    pub fn handle(&self) -> Option<RemoteProfileHandle> {
        self.profile_id.clone().map(RemoteProfileHandle::new)
    }
}

/// Holds the wizard state for one session and writes it through to a
/// [`LocalStore`] after every mutation.
pub struct DraftStore {
    store: Arc<dyn LocalStore>,
    key: String,
    state: WizardState,
    generation: u64,
}

impl DraftStore {
    /// Load the draft for `key`, or start empty.
    ///
    /// An unreadable or corrupt blob is logged and replaced by an empty draft.
    pub fn open(store: Arc<dyn LocalStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let state = match store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<WizardState>(&raw) {
                Ok(state) => {
                    info!(
                        session = %key,
                        step = state.current_step,
                        "Resumed persisted draft"
                    );
                    state
                }
                Err(e) => {
                    warn!(session = %key, error = %e, "Discarding corrupt draft");
                    WizardState::default()
                }
            },
            Ok(None) => WizardState::default(),
            Err(e) => {
                warn!(session = %key, error = %e, "Failed to read draft; starting fresh");
                WizardState::default()
            }
        };
        Self {
            store,
            key,
            state,
            generation: 0,
        }
    }

    pub fn read(&self) -> &WizardState {
        &self.state
    }

    pub fn session_key(&self) -> &str {
        &self.key
    }

    /// Bumped whenever the draft is replaced (reset, new customer type).
    ///
    /// Remote results captured under an older generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new document for `customer_type` at step 0.
    pub fn select_customer_type(&mut self, customer_type: CustomerType) -> Result<(), StoreError> {
        self.state = WizardState {
            customer_type: Some(customer_type),
            document: Document::with_defaults(customer_type),
            ..WizardState::default()
        };
        self.generation += 1;
        info!(session = %self.key, %customer_type, "Customer type selected");
        self.persist()
    }

    /// Write `value` at the dotted `path` and persist.
    pub fn write(&mut self, path: &str, value: Value) -> Result<(), WizardError> {
        let path = FieldPath::parse(path)?;
        self.write_path(&path, value)
    }

    pub fn write_path(&mut self, path: &FieldPath, value: Value) -> Result<(), WizardError> {
        if self.state.customer_type.is_none() {
            return Err(WizardError::NoCustomerType);
        }
        self.state.document.set_path(path, value)?;
        self.persist()?;
        Ok(())
    }

    /// Apply several writes and persist once.
    pub fn write_many(&mut self, writes: &[(FieldPath, Value)]) -> Result<(), WizardError> {
        if self.state.customer_type.is_none() {
            return Err(WizardError::NoCustomerType);
        }
        if let Some((path, _)) = writes
            .iter()
            .find(|(p, _)| crate::model::document::RESERVED_KEYS.contains(&p.root()))
        {
            return Err(PathError::Reserved(path.root().to_string()).into());
        }
        for (path, value) in writes {
            self.state.document.set_path(path, value.clone())?;
        }
        self.persist()?;
        Ok(())
    }

    /// Apply a typed change to the document (list sections, category) and persist.
    pub fn update_document<R>(
        &mut self,
        change: impl FnOnce(&mut Document) -> R,
    ) -> Result<R, StoreError> {
        let result = change(&mut self.state.document);
        self.persist()?;
        Ok(result)
    }

    pub fn set_step(&mut self, index: usize) -> Result<(), StoreError> {
        self.state.current_step = index;
        self.persist()
    }

    pub fn set_field_errors(&mut self, errors: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.state.field_errors = errors;
        self.persist()
    }

    /// Drop the error recorded for one field, if any.
    pub fn clear_field_error(&mut self, field: &str) -> Result<(), StoreError> {
        if self.state.field_errors.remove(field).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn set_profile(&mut self, handle: &RemoteProfileHandle) -> Result<(), StoreError> {
        self.state.profile_id = Some(handle.profile_id.clone());
        self.persist()
    }

    /// Replace the whole state (e.g. when resuming a remote profile).
    pub fn replace(&mut self, state: WizardState) -> Result<(), StoreError> {
        self.state = state;
        self.generation += 1;
        self.persist()
    }

    /// Clear the draft in memory and in durable storage.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.state = WizardState::default();
        self.generation += 1;
        info!(session = %self.key, "Draft cleared");
        self.store.remove(&self.key)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let blob = serde_json::to_string(&self.state)?;
        if let Err(e) = self.store.set(&self.key, &blob) {
            warn!(session = %self.key, error = %e, "Failed to persist draft");
            return Err(e);
        }
        Ok(())
    }
}
