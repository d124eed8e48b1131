//! Error types for the profile wizard.

use std::collections::BTreeMap;

/// User-facing text for failures that carry no server message.
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Could not reach the profile service. Please try again.";

/// Top-level error type for the wizard engine.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Draft store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid field path: {0}")]
    Path(#[from] PathError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("No customer type selected")]
    NoCustomerType,

    #[error("A step submission is already in flight")]
    Busy,
}

impl WizardError {
    /// Message suitable for showing next to the active step.
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(e) => e.user_message(),
            Self::Reconcile(ReconcileError::Remote(e)) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Durable local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Dotted-path parse and write errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path {0:?} contains an empty segment")]
    EmptySegment(String),

    #[error("section {0:?} is managed by its own operations")]
    Reserved(String),
}

/// Pricing recompute failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("{0} would be out of range for these prices")]
    Overflow(&'static str),
}

/// Failures talking to the profile / sub-resource services.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// 4xx: the server understood and refused the request.
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Network failure or 5xx.
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("No remote profile exists yet for this session")]
    MissingProfile,
}

impl RemoteError {
    /// Rejections surface verbatim; everything else gets the generic text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::MissingProfile => self.to_string(),
            Self::Transport(_) | Self::Decode(_) => TRANSPORT_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Collection reconciliation errors.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Item failed validation")]
    Invalid(BTreeMap<String, String>),

    #[error("No item at display index {0}")]
    IndexOutOfRange(usize),

    /// The displayed item cannot be matched to a server record.
    #[error("Item mismatch: {0}")]
    Mismatch(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No remote profile exists yet for this session")]
    MissingProfile,
}

/// Result type alias for the wizard.
pub type Result<T> = std::result::Result<T, WizardError>;
