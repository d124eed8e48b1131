//! Step navigation over the shared draft, with validation before and
//! remote sync after each step.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::pricing::{PRICING_SECTION, PriceField, Pricing};
use crate::draft::{FieldPath, SharedDraft, WizardState};
use crate::error::WizardError;
use crate::model::{Address, CategoryRef, CustomerType, LinkedAccount};
use crate::reconcile::Reconciler;
use crate::remote::{CollectionService, ProfileService, SyncGateway, SyncOutcome};
use crate::steps::{StepId, plan_for};
use crate::validation;

/// Error key under which a failed submission's message is recorded.
pub const STEP_ERROR_KEY: &str = "step";

/// Result of a `next()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Validation failed; the index did not move.
    Invalid(BTreeMap<String, String>),
    /// Moved forward to this index.
    Advanced(usize),
    /// Last step submitted; the draft was cleared.
    Completed,
    /// The step or session changed while the call was in flight.
    Discarded,
}

/// Clears the in-flight flag however `next()` exits.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Coordinates the wizard: step index, validation, remote sync and the
/// list reconcilers, all over one shared draft.
pub struct WizardController {
    draft: SharedDraft,
    gateway: SyncGateway,
    addresses: Reconciler<Address>,
    linked_accounts: Reconciler<LinkedAccount>,
    in_flight: AtomicBool,
}

impl WizardController {
    pub fn new(
        draft: SharedDraft,
        profiles: Arc<dyn ProfileService>,
        addresses: Arc<dyn CollectionService<Address>>,
        linked_accounts: Arc<dyn CollectionService<LinkedAccount>>,
    ) -> Self {
        Self {
            gateway: SyncGateway::new(profiles),
            addresses: Reconciler::new(addresses, Arc::clone(&draft)),
            linked_accounts: Reconciler::new(linked_accounts, Arc::clone(&draft)),
            draft,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Snapshot of the wizard state.
    pub async fn state(&self) -> WizardState {
        self.draft.read().await.read().clone()
    }

    /// Current step, if a customer type has been chosen.
    pub async fn current_step(&self) -> Option<(usize, StepId)> {
        let draft = self.draft.read().await;
        let state = draft.read();
        let plan = plan_for(state.customer_type?);
        let index = state.current_step.min(plan.len() - 1);
        Some((index, plan[index]))
    }

    pub fn addresses(&self) -> &Reconciler<Address> {
        &self.addresses
    }

    pub fn linked_accounts(&self) -> &Reconciler<LinkedAccount> {
        &self.linked_accounts
    }

    /// Start a new draft for `customer_type`.
    pub async fn select_customer_type(&self, customer_type: CustomerType) -> Result<(), WizardError> {
        self.draft.write().await.select_customer_type(customer_type)?;
        Ok(())
    }

    /// Write a field and clear its error. Pricing writes recompute their
    /// dependent fields; a recompute that fails leaves the draft untouched.
    pub async fn write(&self, path: &str, value: Value) -> Result<(), WizardError> {
        let path = FieldPath::parse(path)?;
        let mut draft = self.draft.write().await;

        match PriceField::from_path(&path) {
            Some(field) => {
                let mut preview = draft.read().document.clone();
                preview.set_path(&path, value.clone())?;
                let pricing =
                    Pricing::from_section(&preview.section(PRICING_SECTION)).recompute(field)?;
                let mut writes = vec![(path.clone(), value)];
                writes.extend(pricing.dependent_writes(field));
                draft.write_many(&writes)?;
                debug!(field = field.key(), "Pricing recomputed");
            }
            None => draft.write_path(&path, value)?,
        }
        draft.clear_field_error(&path.to_string())?;
        Ok(())
    }

    pub async fn select_category(&self, category: CategoryRef) -> Result<(), WizardError> {
        let mut draft = self.draft.write().await;
        if draft.read().customer_type.is_none() {
            return Err(WizardError::NoCustomerType);
        }
        draft.update_document(|doc| doc.category = Some(category))?;
        Ok(())
    }

    /// Validate the current step, sync it, then advance or complete.
    ///
    /// A remote failure records the user-facing message under
    /// [`STEP_ERROR_KEY`] and leaves the draft for a retry.
    pub async fn next(&self) -> Result<Transition, WizardError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(WizardError::Busy);
        }
        let _in_flight = InFlight(&self.in_flight);

        let (customer_type, index, handle, document, generation) = {
            let draft = self.draft.read().await;
            let state = draft.read();
            let customer_type = state.customer_type.ok_or(WizardError::NoCustomerType)?;
            let last = plan_for(customer_type).len() - 1;
            (
                customer_type,
                state.current_step.min(last),
                state.handle(),
                state.document.clone(),
                draft.generation(),
            )
        };
        let plan = plan_for(customer_type);
        let step = plan[index];

        let report = validation::validate(customer_type, index, &document);
        if !report.is_valid {
            info!(%step, errors = report.field_errors.len(), "Step blocked by validation");
            self.draft
                .write()
                .await
                .set_field_errors(report.field_errors.clone())?;
            return Ok(Transition::Invalid(report.field_errors));
        }

        let outcome = self
            .gateway
            .submit(step, customer_type, handle.as_ref(), &document)
            .await;

        let mut draft = self.draft.write().await;
        if draft.generation() != generation {
            debug!(%step, "Session replaced during submission; result discarded");
            return match outcome {
                Ok(_) => Ok(Transition::Discarded),
                Err(e) => Err(e.into()),
            };
        }

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%step, error = %e, "Step submission failed");
                if draft.read().current_step == index {
                    let mut errors = BTreeMap::new();
                    errors.insert(STEP_ERROR_KEY.to_string(), e.user_message());
                    draft.set_field_errors(errors)?;
                }
                return Err(e.into());
            }
        };

        if let SyncOutcome::Created(handle) = &outcome {
            draft.set_profile(handle)?;
        }
        if draft.read().current_step != index {
            debug!(%step, "Step changed during submission; not advancing");
            return Ok(Transition::Discarded);
        }

        if index + 1 == plan.len() {
            draft.reset()?;
            info!(%customer_type, "Wizard completed");
            return Ok(Transition::Completed);
        }
        draft.set_field_errors(BTreeMap::new())?;
        draft.set_step(index + 1)?;
        info!(%step, next = %plan[index + 1], "Step advanced");
        Ok(Transition::Advanced(index + 1))
    }

    /// Go back one step. Never validates and never calls the server.
    pub async fn back(&self) -> Result<usize, WizardError> {
        let mut draft = self.draft.write().await;
        let index = draft.read().current_step.saturating_sub(1);
        draft.set_step(index)?;
        Ok(index)
    }

    /// Abandon the draft.
    pub async fn cancel(&self) -> Result<(), WizardError> {
        self.draft.write().await.reset()?;
        Ok(())
    }

    /// Load an existing remote profile into the draft, positioned after the
    /// identity step so the root profile is never created again.
    pub async fn resume(&self, profile_id: &str) -> Result<(), WizardError> {
        let remote = self.gateway.load(profile_id).await?;
        let handle = remote.handle();
        let customer_type = remote.customer_type;
        let state = WizardState {
            customer_type: Some(customer_type),
            current_step: 1,
            document: remote.into_document(),
            field_errors: BTreeMap::new(),
            profile_id: Some(handle.profile_id.clone()),
        };
        self.draft.write().await.replace(state)?;
        info!(profile_id = %handle.profile_id, %customer_type, "Resumed remote profile");
        Ok(())
    }
}
