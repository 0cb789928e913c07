//! Retry policy configuration.

use crate::backoff;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked before each retry sleep.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// A retry about to happen.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEvent {
    /// Label of the operation being retried.
    pub label: String,
    /// Zero-indexed attempt that just failed.
    pub attempt: u32,
    /// Configured retry bound.
    pub max_retries: u32,
    /// Wait before the next attempt.
    pub delay: Duration,
    /// Display form of the failure.
    pub error: String,
}

/// Retry policy for the resilient call wrapper.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Jitter as a fraction of `base_delay`.
    pub jitter_factor: f64,
    /// Label used when reporting retries.
    pub label: String,
    observer: Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: backoff::DEFAULT_BASE_DELAY,
            max_delay: backoff::DEFAULT_MAX_DELAY,
            jitter_factor: backoff::DEFAULT_JITTER_FACTOR,
            label: "api".to_string(),
            observer: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter_factor", &self.jitter_factor)
            .field("label", &self.label)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Create a default policy with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Create a policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set the retry bound.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor. Negative values disable jitter.
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.max(0.0);
        self
    }

    /// Disable jitter.
    pub fn without_jitter(self) -> Self {
        self.with_jitter_factor(0.0)
    }

    /// Set the reporting label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Register a retry observer.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check if another attempt is allowed after the zero-indexed `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay after the zero-indexed `attempt` failed.
    pub fn delay_for_attempt(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        backoff::delay(
            attempt,
            self.base_delay,
            self.max_delay,
            self.jitter_factor,
            server_hint,
        )
    }

    pub(crate) fn notify(&self, event: &RetryEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}
