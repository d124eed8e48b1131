//! Draft persistence: dotted-path writes over the document, written
//! through to durable local storage on every change.

pub mod path;
pub mod state;
pub mod store;

pub use path::FieldPath;
pub use state::{DraftStore, WizardState};
pub use store::{FileStore, LocalStore, MemoryStore};

use std::sync::Arc;

use tokio::sync::RwLock;

/// The draft as shared between the controller and the reconcilers.
///
/// Mutations happen under the write guard with no `.await` while it is
/// held, so draft writes stay synchronous relative to remote calls.
pub type SharedDraft = Arc<RwLock<DraftStore>>;

/// Wrap a draft store for sharing.
pub fn shared(draft: DraftStore) -> SharedDraft {
    Arc::new(RwLock::new(draft))
}
