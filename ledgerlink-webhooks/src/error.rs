//! Error types for webhook verification

use ledgerlink_retry::CallError;
use thiserror::Error;

/// Errors that can occur while verifying a webhook
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Token does not have the compact `header.payload.signature` shape,
    /// or one of its segments does not decode
    #[error("Malformed webhook token: {0}")]
    MalformedToken(String),

    /// Token header declares an algorithm other than ES256
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Verification header missing from request
    #[error("Verification header missing from request")]
    MissingHeader,

    /// Verification key could not be retrieved
    #[error("Failed to fetch verification key: {0}")]
    KeyFetchFailure(#[source] CallError),

    /// Signature did not verify, including after the stale-key retry
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// Body digest does not match the signed claim
    #[error("Webhook body hash mismatch")]
    BodyHashMismatch,

    /// Token issued too long ago
    #[error("Webhook token too old: {age_secs} seconds (max: {max_age_secs} seconds)")]
    StaleToken { age_secs: i64, max_age_secs: u64 },

    /// Provider key is not a usable P-256 key
    #[error("Invalid verification key: {0}")]
    InvalidKey(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Flat failure classification for logging and response mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MalformedToken,
    UnsupportedAlgorithm,
    MissingHeader,
    KeyFetchFailure,
    InvalidSignature,
    BodyHashMismatch,
    StaleToken,
    InvalidKey,
    Config,
}

impl FailureKind {
    /// Stable identifier for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedToken => "malformed_token",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::MissingHeader => "missing_header",
            Self::KeyFetchFailure => "key_fetch_failure",
            Self::InvalidSignature => "invalid_signature",
            Self::BodyHashMismatch => "body_hash_mismatch",
            Self::StaleToken => "stale_token",
            Self::InvalidKey => "invalid_key",
            Self::Config => "config",
        }
    }
}

impl WebhookError {
    /// Get the failure kind
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedToken(_) => FailureKind::MalformedToken,
            Self::UnsupportedAlgorithm(_) => FailureKind::UnsupportedAlgorithm,
            Self::MissingHeader => FailureKind::MissingHeader,
            Self::KeyFetchFailure(_) => FailureKind::KeyFetchFailure,
            Self::InvalidSignature => FailureKind::InvalidSignature,
            Self::BodyHashMismatch => FailureKind::BodyHashMismatch,
            Self::StaleToken { .. } => FailureKind::StaleToken,
            Self::InvalidKey(_) => FailureKind::InvalidKey,
            Self::Config(_) => FailureKind::Config,
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::MalformedToken(err.to_string())
    }
}

impl From<base64::DecodeError> for WebhookError {
    fn from(err: base64::DecodeError) -> Self {
        WebhookError::MalformedToken(err.to_string())
    }
}
