//! Remote profile service: interfaces, HTTP transport, and the step sync
//! gateway.

pub mod gateway;
pub mod http;
pub mod service;

pub use gateway::{SyncGateway, SyncOutcome};
pub use http::HttpProfileApi;
pub use service::{CollectionService, ProfileService, RemoteProfile};
