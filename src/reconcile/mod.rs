//! Keeps the document's list sections (addresses, linked accounts) in step
//! with the server-confirmed collections.
//!
//! Items only enter the list once the server has created them, so every
//! listed item carries its server id. Update and delete address the remote
//! record by that id, never by position in some separately loaded list.
//!
//! Per-item lifecycle: `new → synced(serverId) → editing → synced | deleted`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::draft::SharedDraft;
use crate::error::{ReconcileError, RemoteError};
use crate::model::CollectionItem;
use crate::remote::CollectionService;

/// An item opened for editing, pre-filled with its synced values.
#[derive(Debug, Clone)]
pub struct EditSession<T: CollectionItem> {
    server_id: String,
    /// Working copy; the listed item is untouched until the update succeeds.
    pub fields: T::Fields,
}

impl<T: CollectionItem> EditSession<T> {
    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}

/// Reconciles one list section against its sub-resource service.
pub struct Reconciler<T: CollectionItem> {
    service: Arc<dyn CollectionService<T>>,
    draft: SharedDraft,
    item_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<T: CollectionItem> Reconciler<T> {
    pub fn new(service: Arc<dyn CollectionService<T>>, draft: SharedDraft) -> Self {
        Self {
            service,
            draft,
            item_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock serializing remote calls for one item.
    fn item_lock(&self, server_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.item_locks.lock().expect("item lock map poisoned");
        Arc::clone(locks.entry(server_id.to_string()).or_default())
    }

    fn forget_lock(&self, server_id: &str) {
        let mut locks = self.item_locks.lock().expect("item lock map poisoned");
        locks.remove(server_id);
    }

    /// Current profile id and draft generation.
    async fn session(&self) -> Result<(String, u64), ReconcileError> {
        let draft = self.draft.read().await;
        let profile_id = draft
            .read()
            .profile_id
            .clone()
            .ok_or(ReconcileError::MissingProfile)?;
        Ok((profile_id, draft.generation()))
    }

    /// Snapshot of the listed items.
    pub async fn items(&self) -> Vec<T> {
        let draft = self.draft.read().await;
        T::list(&draft.read().document).to_vec()
    }

    /// Replace the local list with the server's collection.
    pub async fn load(&self) -> Result<usize, ReconcileError> {
        let (profile_id, generation) = self.session().await?;
        let items = self.service.list(&profile_id).await?;

        let mut draft = self.draft.write().await;
        if draft.generation() != generation {
            debug!(kind = %T::KIND, "Discarding list load for a replaced draft");
            return Ok(0);
        }
        let count = items.len();
        draft.update_document(|doc| *T::list_mut(doc) = items)?;
        info!(profile_id, kind = %T::KIND, count, "Collection loaded");
        Ok(count)
    }

    /// Validate, create remotely, then append the synced item.
    ///
    /// On any failure the list is left unchanged.
    pub async fn add(&self, fields: T::Fields) -> Result<T, ReconcileError> {
        let report = T::validate(&fields);
        if !report.is_valid {
            return Err(ReconcileError::Invalid(report.field_errors));
        }
        let (profile_id, generation) = self.session().await?;

        let payload = T::from_fields(fields).payload();
        let created = match self.service.create(&profile_id, &payload).await {
            Ok(item) => item,
            Err(e) => {
                warn!(profile_id, kind = %T::KIND, error = %e, "Item create failed");
                return Err(e.into());
            }
        };
        if created.server_id().is_none() {
            return Err(RemoteError::Decode(format!("created {} item has no id", T::KIND)).into());
        }

        let mut draft = self.draft.write().await;
        if draft.generation() != generation {
            debug!(kind = %T::KIND, "Discarding create result for a replaced draft");
            return Ok(created);
        }
        draft.update_document(|doc| T::list_mut(doc).push(created.clone()))?;
        info!(
            profile_id,
            kind = %T::KIND,
            server_id = created.server_id().unwrap_or_default(),
            "Item added"
        );
        Ok(created)
    }

    /// Open the item at display `index` for editing.
    pub async fn begin_edit(&self, index: usize) -> Result<EditSession<T>, ReconcileError> {
        let draft = self.draft.read().await;
        let item = T::list(&draft.read().document)
            .get(index)
            .ok_or(ReconcileError::IndexOutOfRange(index))?;
        let server_id = item
            .server_id()
            .ok_or_else(|| ReconcileError::Mismatch(format!("item {index} was never synced")))?;
        Ok(EditSession {
            server_id: server_id.to_string(),
            fields: item.fields().clone(),
        })
    }

    /// Send the edited fields; on success replace the listed item.
    ///
    /// On failure the listed item keeps its prior synced values.
    pub async fn commit_edit(&self, session: EditSession<T>) -> Result<T, ReconcileError> {
        let report = T::validate(&session.fields);
        if !report.is_valid {
            return Err(ReconcileError::Invalid(report.field_errors));
        }

        self.ensure_listed(&session.server_id).await?;
        let lock = self.item_lock(&session.server_id);
        let _guard = lock.lock().await;

        let (profile_id, generation) = self.session().await?;
        self.ensure_still_listed(&session.server_id).await?;

        let payload = T::from_fields(session.fields).payload();
        let mut updated = match self
            .service
            .update(&profile_id, &session.server_id, &payload)
            .await
        {
            Ok(item) => item,
            Err(e) => {
                warn!(
                    profile_id,
                    kind = %T::KIND,
                    server_id = %session.server_id,
                    error = %e,
                    "Item update failed"
                );
                return Err(e.into());
            }
        };
        if updated.server_id().is_none() {
            updated.assign_server_id(session.server_id.clone());
        }

        let mut draft = self.draft.write().await;
        if draft.generation() != generation {
            debug!(kind = %T::KIND, "Discarding update result for a replaced draft");
            return Ok(updated);
        }
        let replaced = draft.update_document(|doc| {
            let list = T::list_mut(doc);
            match list
                .iter()
                .position(|item| item.server_id() == Some(session.server_id.as_str()))
            {
                Some(pos) => {
                    list[pos] = updated.clone();
                    true
                }
                None => false,
            }
        })?;
        if replaced {
            info!(profile_id, kind = %T::KIND, server_id = %session.server_id, "Item updated");
        } else {
            debug!(server_id = %session.server_id, "Updated item no longer listed; result dropped");
        }
        Ok(updated)
    }

    /// Delete the item at display `index` remotely, then remove it locally.
    ///
    /// On failure the item stays listed.
    pub async fn delete(&self, index: usize) -> Result<T, ReconcileError> {
        let server_id = {
            let draft = self.draft.read().await;
            let item = T::list(&draft.read().document)
                .get(index)
                .ok_or(ReconcileError::IndexOutOfRange(index))?;
            item.server_id()
                .ok_or_else(|| ReconcileError::Mismatch(format!("item {index} was never synced")))?
                .to_string()
        };

        let lock = self.item_lock(&server_id);
        let _guard = lock.lock().await;

        let (profile_id, generation) = self.session().await?;
        self.ensure_still_listed(&server_id).await?;

        if let Err(e) = self.service.delete(&profile_id, &server_id).await {
            warn!(profile_id, kind = %T::KIND, server_id, error = %e, "Item delete failed");
            return Err(e.into());
        }

        let mut draft = self.draft.write().await;
        if draft.generation() != generation {
            debug!(kind = %T::KIND, "Discarding delete result for a replaced draft");
            return Err(ReconcileError::Mismatch(format!("{server_id} belongs to a replaced draft")));
        }
        let removed = draft.update_document(|doc| {
            let list = T::list_mut(doc);
            list.iter()
                .position(|item| item.server_id() == Some(server_id.as_str()))
                .map(|pos| list.remove(pos))
        })?;
        self.forget_lock(&server_id);

        match removed {
            Some(item) => {
                info!(profile_id, kind = %T::KIND, server_id, "Item deleted");
                Ok(item)
            }
            None => Err(ReconcileError::Mismatch(format!("{server_id} is no longer listed"))),
        }
    }

    /// Like `ensure_listed`, for callers already holding the item lock: an
    /// item that vanished while they waited has its lock dropped.
    async fn ensure_still_listed(&self, server_id: &str) -> Result<(), ReconcileError> {
        let listed = self.ensure_listed(server_id).await;
        if listed.is_err() {
            self.forget_lock(server_id);
        }
        listed
    }

    async fn ensure_listed(&self, server_id: &str) -> Result<(), ReconcileError> {
        let draft = self.draft.read().await;
        let listed = T::list(&draft.read().document)
            .iter()
            .any(|item| item.server_id() == Some(server_id));
        if listed {
            Ok(())
        } else {
            Err(ReconcileError::Mismatch(format!("{server_id} is no longer listed")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::draft::{DraftStore, MemoryStore, shared};
    use crate::model::{
        AccountStatus, Address, AddressFields, CustomerType, LinkedAccount, LinkedAccountFields,
        RemoteProfileHandle, Visibility,
    };

    #[derive(Default)]
    struct FakeAddresses {
        calls: Mutex<Vec<String>>,
        next_id: AtomicUsize,
        fail: Mutex<Option<RemoteError>>,
        slow_update: bool,
        slow_delete: bool,
    }

    impl FakeAddresses {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn failing(&self, err: RemoteError) {
            *self.fail.lock().unwrap() = Some(err);
        }

        fn check_fail(&self) -> Result<(), RemoteError> {
            match self.fail.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CollectionService<Address> for FakeAddresses {
        async fn list(&self, profile_id: &str) -> Result<Vec<Address>, RemoteError> {
            self.calls.lock().unwrap().push(format!("list {profile_id}"));
            self.check_fail()?;
            Ok(vec![Address::new(fields("Server", "9 Remote Rd")).with_server_id("addr-srv")])
        }

        async fn create(&self, profile_id: &str, payload: &Value) -> Result<Address, RemoteError> {
            self.calls.lock().unwrap().push(format!("create {profile_id}"));
            self.check_fail()?;
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let mut item: Address = serde_json::from_value(payload.clone()).unwrap();
            item.assign_server_id(format!("addr-{n}"));
            Ok(item)
        }

        async fn update(
            &self,
            _profile_id: &str,
            item_id: &str,
            payload: &Value,
        ) -> Result<Address, RemoteError> {
            self.calls.lock().unwrap().push(format!("update-start {item_id}"));
            if self.slow_update {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            self.calls.lock().unwrap().push(format!("update-end {item_id}"));
            self.check_fail()?;
            // Server echoes without an id to exercise the fallback.
            Ok(serde_json::from_value(payload.clone()).unwrap())
        }

        async fn delete(&self, _profile_id: &str, item_id: &str) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(format!("delete {item_id}"));
            if self.slow_delete {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            self.check_fail()
        }
    }

    #[derive(Default)]
    struct FakeAccounts {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CollectionService<LinkedAccount> for FakeAccounts {
        async fn list(&self, _profile_id: &str) -> Result<Vec<LinkedAccount>, RemoteError> {
            Ok(Vec::new())
        }

        async fn create(
            &self,
            profile_id: &str,
            payload: &Value,
        ) -> Result<LinkedAccount, RemoteError> {
            self.calls.lock().unwrap().push(format!("create {profile_id}"));
            let mut echoed = payload.clone();
            echoed["id"] = Value::from("acc-7");
            echoed["status"] = Value::from("active");
            Ok(serde_json::from_value(echoed).unwrap())
        }

        async fn update(
            &self,
            _profile_id: &str,
            item_id: &str,
            payload: &Value,
        ) -> Result<LinkedAccount, RemoteError> {
            self.calls.lock().unwrap().push(format!("update {item_id}"));
            Ok(serde_json::from_value(payload.clone()).unwrap())
        }

        async fn delete(&self, _profile_id: &str, item_id: &str) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(format!("delete {item_id}"));
            Ok(())
        }
    }

    fn fields(title: &str, street: &str) -> AddressFields {
        AddressFields {
            title: title.into(),
            street: street.into(),
            city: "Springfield".into(),
            country: "US".into(),
            ..Default::default()
        }
    }

    fn synced_draft() -> SharedDraft {
        let mut store = DraftStore::open(Arc::new(MemoryStore::new()), "s");
        store.select_customer_type(CustomerType::Domestic).unwrap();
        store.set_profile(&RemoteProfileHandle::new("p-1")).unwrap();
        shared(store)
    }

    async fn setup(service: Arc<FakeAddresses>) -> (Reconciler<Address>, SharedDraft) {
        let draft = synced_draft();
        (Reconciler::new(service, Arc::clone(&draft)), draft)
    }

    #[tokio::test]
    async fn add_then_delete_targets_created_id() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;

        let created = reconciler.add(fields("Home", "1 Main St")).await.unwrap();
        assert_eq!(created.server_id(), Some("addr-1"));
        assert_eq!(reconciler.items().await.len(), 1);

        let removed = reconciler.delete(0).await.unwrap();
        assert_eq!(removed.server_id(), Some("addr-1"));
        assert!(reconciler.items().await.is_empty());
        assert_eq!(service.calls(), vec!["create p-1", "delete addr-1"]);
    }

    #[tokio::test]
    async fn invalid_item_never_reaches_network() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;

        let err = reconciler.add(fields("", "1 Main St")).await.unwrap_err();
        match err {
            ReconcileError::Invalid(errors) => assert!(errors.contains_key("title")),
            other => panic!("expected Invalid, got {other:?}"),
        }
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_create_adds_nothing() {
        let service = Arc::new(FakeAddresses::default());
        service.failing(RemoteError::Transport("timeout".into()));
        let (reconciler, _draft) = setup(service.clone()).await;

        assert!(reconciler.add(fields("Home", "1 Main St")).await.is_err());
        assert!(reconciler.items().await.is_empty());
    }

    #[tokio::test]
    async fn add_requires_profile() {
        let service = Arc::new(FakeAddresses::default());
        let mut store = DraftStore::open(Arc::new(MemoryStore::new()), "s");
        store.select_customer_type(CustomerType::Domestic).unwrap();
        let reconciler = Reconciler::new(service.clone(), shared(store));
        let err = reconciler.add(fields("Home", "1 Main St")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::MissingProfile));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn edit_replaces_item_and_recomputes_join() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        let mut session = reconciler.begin_edit(0).await.unwrap();
        assert_eq!(session.fields.street, "1 Main St");
        session.fields.street = "2 Elm St".into();
        let updated = reconciler.commit_edit(session).await.unwrap();

        assert_eq!(updated.server_id(), Some("addr-1"));
        let items = reconciler.items().await;
        assert_eq!(items[0].concatenated_address(), "2 Elm St, Springfield, US");
        assert_eq!(items[0].server_id(), Some("addr-1"));
    }

    #[tokio::test]
    async fn failed_edit_keeps_prior_values() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        let mut session = reconciler.begin_edit(0).await.unwrap();
        session.fields.street = "2 Elm St".into();
        service.failing(RemoteError::Rejected {
            status: 400,
            message: "bad street".into(),
        });
        assert!(reconciler.commit_edit(session).await.is_err());
        assert_eq!(reconciler.items().await[0].fields().street, "1 Main St");
    }

    #[tokio::test]
    async fn failed_delete_keeps_item() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        service.failing(RemoteError::Transport("503".into()));
        assert!(reconciler.delete(0).await.is_err());
        assert_eq!(reconciler.items().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_middle_item_targets_its_own_id() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        for street in ["1 A St", "2 B St", "3 C St"] {
            reconciler.add(fields("x", street)).await.unwrap();
        }

        let removed = reconciler.delete(1).await.unwrap();
        assert_eq!(removed.fields().street, "2 B St");
        assert_eq!(service.calls().last().unwrap(), "delete addr-2");

        let ids: Vec<String> = reconciler
            .items()
            .await
            .iter()
            .map(|a| a.server_id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["addr-1", "addr-3"]);
    }

    #[tokio::test]
    async fn delete_out_of_range_makes_no_call() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        assert!(matches!(
            reconciler.delete(0).await,
            Err(ReconcileError::IndexOutOfRange(0))
        ));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn edit_of_deleted_item_is_mismatch() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        let session = reconciler.begin_edit(0).await.unwrap();
        reconciler.delete(0).await.unwrap();
        let err = reconciler.commit_edit(session).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Mismatch(_)));
        assert!(!service.calls().iter().any(|c| c.starts_with("update")));
        assert!(reconciler.item_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_waiting_on_delete_leaves_no_lock_behind() {
        let service = Arc::new(FakeAddresses {
            slow_delete: true,
            ..Default::default()
        });
        let (reconciler, _draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        let session = reconciler.begin_edit(0).await.unwrap();
        let edit = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            reconciler.commit_edit(session).await
        };
        let (deleted, edited) = tokio::join!(reconciler.delete(0), edit);
        assert!(deleted.is_ok());
        assert!(matches!(edited, Err(ReconcileError::Mismatch(_))));
        assert!(!service.calls().iter().any(|c| c.starts_with("update")));
        assert!(reconciler.item_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_item_calls_are_serialized() {
        let service = Arc::new(FakeAddresses {
            slow_update: true,
            ..Default::default()
        });
        let (reconciler, _draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        let mut session = reconciler.begin_edit(0).await.unwrap();
        session.fields.street = "2 Elm St".into();
        let (updated, deleted) =
            tokio::join!(reconciler.commit_edit(session), reconciler.delete(0));
        assert!(updated.is_ok());
        assert!(deleted.is_ok());

        assert_eq!(
            service.calls(),
            vec![
                "create p-1",
                "update-start addr-1",
                "update-end addr-1",
                "delete addr-1"
            ]
        );
        assert!(reconciler.items().await.is_empty());
    }

    #[tokio::test]
    async fn load_replaces_list() {
        let service = Arc::new(FakeAddresses::default());
        let (reconciler, _draft) = setup(service.clone()).await;
        assert_eq!(reconciler.load().await.unwrap(), 1);
        assert_eq!(reconciler.items().await[0].server_id(), Some("addr-srv"));
    }

    #[tokio::test]
    async fn result_after_reset_is_discarded() {
        let service = Arc::new(FakeAddresses {
            slow_update: true,
            ..Default::default()
        });
        let (reconciler, draft) = setup(service.clone()).await;
        reconciler.add(fields("Home", "1 Main St")).await.unwrap();

        let mut session = reconciler.begin_edit(0).await.unwrap();
        session.fields.street = "2 Elm St".into();
        let reset = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            draft.write().await.reset().unwrap();
        };
        let (result, ()) = tokio::join!(reconciler.commit_edit(session), reset);
        assert!(result.is_ok());
        assert!(draft.read().await.read().document.addresses.is_empty());
    }

    #[tokio::test]
    async fn linked_accounts_reconcile_by_server_id() {
        let service = Arc::new(FakeAccounts::default());
        let draft = synced_draft();
        let reconciler: Reconciler<LinkedAccount> =
            Reconciler::new(service.clone(), Arc::clone(&draft));

        let err = reconciler
            .add(LinkedAccountFields::default())
            .await
            .unwrap_err();
        match err {
            ReconcileError::Invalid(errors) => {
                assert!(errors.contains_key("provider"));
                assert!(errors.contains_key("handle"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }

        let created = reconciler
            .add(LinkedAccountFields {
                provider: "github".into(),
                handle: "ada".into(),
                visibility: Visibility::ContactsOnly,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.server_id(), Some("acc-7"));
        assert_eq!(created.fields().status, AccountStatus::Active);
        assert_eq!(draft.read().await.read().document.linked_accounts.len(), 1);
        assert!(draft.read().await.read().document.addresses.is_empty());

        let mut session = reconciler.begin_edit(0).await.unwrap();
        session.fields.handle = "lovelace".into();
        let updated = reconciler.commit_edit(session).await.unwrap();
        assert_eq!(updated.server_id(), Some("acc-7"));
        assert_eq!(reconciler.items().await[0].fields().handle, "lovelace");

        let removed = reconciler.delete(0).await.unwrap();
        assert_eq!(removed.server_id(), Some("acc-7"));
        assert!(reconciler.items().await.is_empty());
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec!["create p-1", "update acc-7", "delete acc-7"]
        );
    }
}
