//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Wizard runtime configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Base URL of the profile service, without trailing slash.
    pub api_base_url: String,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<SecretString>,
    /// Directory holding one JSON draft per session.
    pub draft_dir: PathBuf,
    /// Key the draft is persisted under.
    pub session_key: String,
    /// Per-request timeout for the HTTP transport.
    pub request_timeout: Duration,
}

impl WizardConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            draft_dir: PathBuf::from("./data/drafts"),
            session_key: uuid::Uuid::new_v4().to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Build configuration from `WIZARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = lookup("WIZARD_API_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("WIZARD_API_BASE_URL".to_string()))?;
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "WIZARD_API_BASE_URL".to_string(),
                message: format!("expected an http(s) URL, got {base:?}"),
            });
        }

        let mut config = Self::new(base);

        config.api_token = lookup("WIZARD_API_TOKEN")
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        if let Some(dir) = lookup("WIZARD_DRAFT_DIR").filter(|s| !s.is_empty()) {
            config.draft_dir = PathBuf::from(dir);
        }

        if let Some(session) = lookup("WIZARD_SESSION").filter(|s| !s.is_empty()) {
            if session.contains(['/', '\\']) || session.starts_with('.') {
                return Err(ConfigError::InvalidValue {
                    key: "WIZARD_SESSION".to_string(),
                    message: "session key must be a plain file name".to_string(),
                });
            }
            config.session_key = session;
        }

        if let Some(raw) = lookup("WIZARD_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "WIZARD_HTTP_TIMEOUT_SECS".to_string(),
                message: format!("not a number: {raw:?}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "WIZARD_HTTP_TIMEOUT_SECS".to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
