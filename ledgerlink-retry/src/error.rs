//! Tagged failure type for upstream calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for upstream calls.
pub type CallResult<T> = std::result::Result<T, CallError>;

/// Network-level failure code, set when no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkCode {
    /// Peer reset the connection (`ECONNRESET`).
    ConnectionReset,
    /// Request or connect timed out (`ETIMEDOUT`).
    Timeout,
    /// Host name could not be resolved (`ENOTFOUND`).
    NameNotFound,
    /// Connection aborted locally (`ECONNABORTED`).
    ConnectionAborted,
    /// Any other transport code.
    Other(String),
}

impl NetworkCode {
    /// Parse a POSIX-style error code string.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ECONNRESET" => Self::ConnectionReset,
            "ETIMEDOUT" => Self::Timeout,
            "ENOTFOUND" => Self::NameNotFound,
            "ECONNABORTED" => Self::ConnectionAborted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Get the code string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionReset => "ECONNRESET",
            Self::Timeout => "ETIMEDOUT",
            Self::NameNotFound => "ENOTFOUND",
            Self::ConnectionAborted => "ECONNABORTED",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for NetworkCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider's `error_type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderErrorType {
    /// Malformed request; never retried.
    InvalidRequest,
    /// Request was well-formed but carried bad values.
    InvalidInput,
    /// A previously returned value was used incorrectly.
    InvalidResult,
    /// The linked item needs user attention; never retried.
    ItemError,
    /// The financial institution is unavailable.
    InstitutionError,
    /// Too many requests.
    RateLimitExceeded,
    /// Transient provider failure.
    ApiError,
    /// Transient provider failure.
    InternalServerError,
    /// Unknown type, kept verbatim.
    Other(String),
}

impl ProviderErrorType {
    /// Get the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidResult => "INVALID_RESULT",
            Self::ItemError => "ITEM_ERROR",
            Self::InstitutionError => "INSTITUTION_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ApiError => "API_ERROR",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for ProviderErrorType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INVALID_REQUEST" => Self::InvalidRequest,
            "INVALID_INPUT" => Self::InvalidInput,
            "INVALID_RESULT" => Self::InvalidResult,
            "ITEM_ERROR" => Self::ItemError,
            "INSTITUTION_ERROR" => Self::InstitutionError,
            "RATE_LIMIT_EXCEEDED" => Self::RateLimitExceeded,
            "API_ERROR" => Self::ApiError,
            "INTERNAL_SERVER_ERROR" => Self::InternalServerError,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ProviderErrorType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ProviderErrorType> for String {
    fn from(value: ProviderErrorType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProviderErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed upstream call.
///
/// Carries whichever of the network code, HTTP status and provider error
/// type were observed. Classification is done by [`crate::classify`], not
/// by the call site.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CallError {
    /// Transport failure code, if no response was received.
    pub network: Option<NetworkCode>,
    /// HTTP status of the response.
    pub status: Option<u16>,
    /// Provider `error_type`.
    pub provider: Option<ProviderErrorType>,
    /// Provider `error_code` (e.g. `ITEM_LOGIN_REQUIRED`), informational only.
    pub provider_code: Option<String>,
    /// Server-supplied retry hint (`Retry-After`).
    pub retry_after: Option<Duration>,
    /// Human readable description.
    pub message: String,
}

impl CallError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            network: None,
            status: None,
            provider: None,
            provider_code: None,
            retry_after: None,
            message: message.into(),
        }
    }

    /// Create a transport-level error.
    pub fn network(code: NetworkCode, message: impl Into<String>) -> Self {
        Self {
            network: Some(code),
            ..Self::new(message)
        }
    }

    /// Create an error for an HTTP response status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    /// Attach the provider `error_type`.
    pub fn with_provider(mut self, provider: impl Into<ProviderErrorType>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach the provider `error_code`.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Attach a server retry hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Check if this is a rate-limit response.
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }
}
