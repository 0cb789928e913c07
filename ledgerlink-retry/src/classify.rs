//! Failure classification: which upstream failures are worth retrying.

use crate::error::{CallError, NetworkCode, ProviderErrorType};
use std::time::Duration;

/// Retry eligibility of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transient; another attempt may succeed.
    Retryable,
    /// Permanent; retrying cannot help.
    Terminal,
}

impl Classification {
    /// Check if the failure may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Classify a failed call.
///
/// Checks run in a fixed order. Provider types that are known to be
/// permanent win over a 5xx status, and anything unrecognised is terminal.
pub fn classify(error: &CallError) -> Classification {
    if let Some(code) = &error.network
        && is_retryable_network_code(code)
    {
        return Classification::Retryable;
    }

    if let Some(status) = error.status
        && (400..500).contains(&status)
        && status != 429
    {
        return Classification::Terminal;
    }

    if matches!(
        error.provider,
        Some(ProviderErrorType::InvalidRequest | ProviderErrorType::ItemError)
    ) {
        return Classification::Terminal;
    }

    match error.status {
        Some(429) => return Classification::Retryable,
        Some(status) if status >= 500 => return Classification::Retryable,
        _ => {}
    }

    if matches!(
        error.provider,
        Some(ProviderErrorType::ApiError | ProviderErrorType::InternalServerError)
    ) {
        return Classification::Retryable;
    }

    Classification::Terminal
}

fn is_retryable_network_code(code: &NetworkCode) -> bool {
    matches!(
        code,
        NetworkCode::ConnectionReset
            | NetworkCode::Timeout
            | NetworkCode::NameNotFound
            | NetworkCode::ConnectionAborted
    )
}

/// Errors the resilient call wrapper knows how to retry.
pub trait Transient {
    /// Decide retry eligibility.
    fn classification(&self) -> Classification;

    /// Server-supplied minimum wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for CallError {
    fn classification(&self) -> Classification {
        classify(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}
