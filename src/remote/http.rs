//! HTTP transport for the profile service (reqwest).
//!
//! Routes:
//! - `POST   {base}/profiles`
//! - `GET    {base}/profiles/{id}`
//! - `PATCH  {base}/profiles/{id}/{section}`
//! - `GET    {base}/profiles/{id}/{addresses|linked-accounts}`
//! - `POST   {base}/profiles/{id}/{addresses|linked-accounts}`
//! - `PUT    {base}/profiles/{id}/{addresses|linked-accounts}/{itemId}`
//! - `DELETE {base}/profiles/{id}/{addresses|linked-accounts}/{itemId}`

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::service::{CollectionService, ProfileService, RemoteProfile};
use crate::config::WizardConfig;
use crate::error::RemoteError;
use crate::model::{CollectionItem, RemoteProfileHandle};

/// Client for the profile service and its sub-resources.
pub struct HttpProfileApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

#[derive(Deserialize)]
struct Created {
    #[serde(alias = "_id")]
    id: String,
}

impl HttpProfileApi {
    pub fn new(config: &WizardConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            RemoteError::Transport(format!("Invalid base URL {}: {e}", config.api_base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!(
                "Base URL {} cannot carry a path",
                config.api_base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
        })
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Classify a response: 2xx passes, 4xx is a rejection carrying the server's
/// message, anything else is a transport failure.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_client_error() {
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: rejection_message(status, &body),
        })
    } else {
        Err(RemoteError::Transport(format!("{status}: {}", body.trim())))
    }
}

/// Pull the human-readable message out of an error body.
///
/// Accepts `{"message": "..."}`, `{"message": ["...", "..."]}` and
/// `{"error": "..."}`; falls back to the raw body, then the status reason.
fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            match json.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Array(items)) => {
                    let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                    if !parts.is_empty() {
                        return parts.join("; ");
                    }
                }
                _ => {}
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request rejected")
            .to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl ProfileService for HttpProfileApi {
    async fn create(&self, payload: &Value) -> Result<RemoteProfileHandle, RemoteError> {
        debug!("POST /profiles");
        let created: Created = self
            .send_json(self.client.post(self.url(&["profiles"])).json(payload))
            .await?;
        Ok(RemoteProfileHandle::new(created.id))
    }

    async fn patch_section(
        &self,
        profile_id: &str,
        section: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        debug!(profile_id, section, "PATCH profile section");
        let url = self.url(&["profiles", profile_id, section]);
        self.send(self.client.patch(url).json(payload)).await?;
        Ok(())
    }

    async fn get_by_id(&self, profile_id: &str) -> Result<RemoteProfile, RemoteError> {
        debug!(profile_id, "GET profile");
        let url = self.url(&["profiles", profile_id]);
        self.send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl<T: CollectionItem> CollectionService<T> for HttpProfileApi {
    async fn list(&self, profile_id: &str) -> Result<Vec<T>, RemoteError> {
        let url = self.url(&["profiles", profile_id, T::KIND.resource()]);
        self.send_json(self.client.get(url)).await
    }

    async fn create(&self, profile_id: &str, payload: &Value) -> Result<T, RemoteError> {
        debug!(profile_id, kind = %T::KIND, "Creating item");
        let url = self.url(&["profiles", profile_id, T::KIND.resource()]);
        self.send_json(self.client.post(url).json(payload)).await
    }

    async fn update(
        &self,
        profile_id: &str,
        item_id: &str,
        payload: &Value,
    ) -> Result<T, RemoteError> {
        debug!(profile_id, item_id, kind = %T::KIND, "Updating item");
        let url = self.url(&["profiles", profile_id, T::KIND.resource(), item_id]);
        self.send_json(self.client.put(url).json(payload)).await
    }

    async fn delete(&self, profile_id: &str, item_id: &str) -> Result<(), RemoteError> {
        debug!(profile_id, item_id, kind = %T::KIND, "Deleting item");
        let url = self.url(&["profiles", profile_id, T::KIND.resource(), item_id]);
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}
