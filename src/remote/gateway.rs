//! Maps a completed step to its profile service call.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::service::{ProfileService, RemoteProfile};
use crate::error::RemoteError;
use crate::model::{CustomerType, Document, RemoteProfileHandle};
use crate::steps::{StepId, SyncBinding};

/// Identity fields never sent to the server.
const LOCAL_ONLY_FIELDS: &[&str] = &["confirmPassword"];

/// What the gateway did for a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Root profile created; the handle must be recorded.
    Created(RemoteProfileHandle),
    /// Section PATCHed.
    Patched,
    /// Nothing to send (handle already exists, or list step).
    Skipped,
}

/// Sends step submissions to the profile service.
pub struct SyncGateway {
    profiles: Arc<dyn ProfileService>,
}

impl SyncGateway {
    pub fn new(profiles: Arc<dyn ProfileService>) -> Self {
        Self { profiles }
    }

    /// Run the remote operation bound to `step`.
    ///
    /// Step 0 creates the root profile only while `handle` is `None`; with a
    /// handle it passes through without a call. Section steps PATCH without
    /// retrying.
    pub async fn submit(
        &self,
        step: StepId,
        customer_type: CustomerType,
        handle: Option<&RemoteProfileHandle>,
        document: &Document,
    ) -> Result<SyncOutcome, RemoteError> {
        match step.binding() {
            SyncBinding::CreateProfile => match handle {
                Some(existing) => {
                    info!(profile_id = %existing.profile_id, "Profile exists; skipping create");
                    Ok(SyncOutcome::Skipped)
                }
                None => {
                    let payload = identity_payload(customer_type, document);
                    let created = self.create_profile(&payload).await?;
                    Ok(SyncOutcome::Created(created))
                }
            },
            SyncBinding::PatchSection(section) => {
                let handle = handle.ok_or(RemoteError::MissingProfile)?;
                let payload = section_payload(section, document);
                self.update_section(handle, section, &payload).await?;
                Ok(SyncOutcome::Patched)
            }
            SyncBinding::None => Ok(SyncOutcome::Skipped),
        }
    }

    pub async fn create_profile(&self, payload: &Value) -> Result<RemoteProfileHandle, RemoteError> {
        match self.profiles.create(payload).await {
            Ok(handle) => {
                info!(profile_id = %handle.profile_id, "Root profile created");
                Ok(handle)
            }
            Err(e) => {
                warn!(error = %e, "Profile creation failed");
                Err(e)
            }
        }
    }

    pub async fn update_section(
        &self,
        handle: &RemoteProfileHandle,
        section: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        match self
            .profiles
            .patch_section(&handle.profile_id, section, payload)
            .await
        {
            Ok(()) => {
                info!(profile_id = %handle.profile_id, section, "Profile section updated");
                Ok(())
            }
            Err(e) => {
                warn!(profile_id = %handle.profile_id, section, error = %e, "Section update failed");
                Err(e)
            }
        }
    }

    /// Fetch an existing profile to resume editing it.
    pub async fn load(&self, profile_id: &str) -> Result<RemoteProfile, RemoteError> {
        self.profiles.get_by_id(profile_id).await
    }
}

/// Step 0 body: the top-level identity fields plus the customer type.
///
/// Nested sections belong to later steps and are left out.
pub fn identity_payload(customer_type: CustomerType, document: &Document) -> Value {
    let mut payload: Map<String, Value> = document
        .fields
        .iter()
        .filter(|(key, value)| !value.is_object() && !LOCAL_ONLY_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    payload.insert(
        "customerType".to_string(),
        Value::String(customer_type.to_string()),
    );
    Value::Object(payload)
}

/// Body for a 1:1 section PATCH. The info sections carry the category id.
pub fn section_payload(section: &str, document: &Document) -> Value {
    let mut payload = document.section(section);
    if matches!(section, "personalInfo" | "businessInfo") {
        if let (Some(obj), Some(category)) = (payload.as_object_mut(), &document.category) {
            obj.insert(
                "categoryId".to_string(),
                Value::String(category.id().to_string()),
            );
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::draft::FieldPath;
    use crate::model::CategoryRef;

    #[derive(Default)]
    struct RecordingProfiles {
        calls: Mutex<Vec<String>>,
        fail_with: Option<RemoteError>,
    }

    #[async_trait]
    impl ProfileService for RecordingProfiles {
        async fn create(&self, payload: &Value) -> Result<RemoteProfileHandle, RemoteError> {
            self.calls.lock().unwrap().push(format!("create {payload}"));
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(RemoteProfileHandle::new("p-1")),
            }
        }

        async fn patch_section(
            &self,
            profile_id: &str,
            section: &str,
            payload: &Value,
        ) -> Result<(), RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("patch {profile_id} {section} {payload}"));
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn get_by_id(&self, _profile_id: &str) -> Result<RemoteProfile, RemoteError> {
            unimplemented!("not used in gateway tests")
        }
    }

    fn document() -> Document {
        let mut doc = Document::with_defaults(CustomerType::Domestic);
        for (path, value) in [
            ("firstName", json!("Ada")),
            ("password", json!("analytical")),
            ("confirmPassword", json!("analytical")),
            ("buildingAccessInfo.ownershipStatus", json!("rental")),
        ] {
            doc.set_path(&FieldPath::parse(path).unwrap(), value).unwrap();
        }
        doc
    }

    #[test]
    fn identity_payload_drops_sections_and_confirmation() {
        let payload = identity_payload(CustomerType::Domestic, &document());
        assert_eq!(
            payload,
            json!({"firstName": "Ada", "password": "analytical", "customerType": "domestic"})
        );
    }

    #[test]
    fn section_payload_adds_category_to_info_sections() {
        let mut doc = document();
        doc.category = Some(CategoryRef::Resolved {
            id: "cat-1".into(),
            name: "Retail".into(),
        });
        assert_eq!(
            section_payload("personalInfo", &doc),
            json!({"categoryId": "cat-1"})
        );
        assert_eq!(
            section_payload("buildingAccessInfo", &doc),
            json!({"ownershipStatus": "rental"})
        );
    }

    #[tokio::test]
    async fn step_zero_creates_without_handle() {
        let profiles = Arc::new(RecordingProfiles::default());
        let gateway = SyncGateway::new(profiles.clone());
        let outcome = gateway
            .submit(StepId::Identity, CustomerType::Domestic, None, &document())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Created(RemoteProfileHandle::new("p-1")));
        assert_eq!(profiles.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn step_zero_with_handle_is_passthrough() {
        let profiles = Arc::new(RecordingProfiles::default());
        let gateway = SyncGateway::new(profiles.clone());
        let handle = RemoteProfileHandle::new("p-1");
        for _ in 0..3 {
            let outcome = gateway
                .submit(StepId::Identity, CustomerType::Domestic, Some(&handle), &document())
                .await
                .unwrap();
            assert_eq!(outcome, SyncOutcome::Skipped);
        }
        assert!(profiles.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn section_step_patches_and_resubmits_harmlessly() {
        let profiles = Arc::new(RecordingProfiles::default());
        let gateway = SyncGateway::new(profiles.clone());
        let handle = RemoteProfileHandle::new("p-1");
        for _ in 0..2 {
            gateway
                .submit(
                    StepId::BuildingAccess,
                    CustomerType::Domestic,
                    Some(&handle),
                    &document(),
                )
                .await
                .unwrap();
        }
        let calls = profiles.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.starts_with("patch p-1 buildingAccessInfo")));
        assert!(!calls.iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn section_step_without_handle_fails() {
        let gateway = SyncGateway::new(Arc::new(RecordingProfiles::default()));
        let err = gateway
            .submit(StepId::Security, CustomerType::Domestic, None, &document())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MissingProfile));
    }

    #[tokio::test]
    async fn list_steps_make_no_call() {
        let profiles = Arc::new(RecordingProfiles::default());
        let gateway = SyncGateway::new(profiles.clone());
        let outcome = gateway
            .submit(StepId::Addresses, CustomerType::Domestic, None, &document())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert!(profiles.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_propagate_unchanged() {
        let profiles = Arc::new(RecordingProfiles {
            fail_with: Some(RemoteError::Rejected {
                status: 422,
                message: "Phone already used".into(),
            }),
            ..Default::default()
        });
        let gateway = SyncGateway::new(profiles);
        let err = gateway
            .submit(StepId::Identity, CustomerType::Domestic, None, &document())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Phone already used");
    }
}
