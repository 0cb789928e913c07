//! Verification key retrieval.

use crate::Result;
use crate::config::ProviderConfig;
use crate::key::{Jwk, VerificationKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ledgerlink_retry::{CallError, NetworkCode};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Provider API path of the key endpoint.
pub const VERIFICATION_KEY_PATH: &str = "webhook_verification_key/get";

/// Source of verification keys.
///
/// A single call makes a single attempt; the verifier owns retries.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Fetch the key with the given id.
    async fn fetch_verification_key(
        &self,
        key_id: &str,
    ) -> std::result::Result<VerificationKey, CallError>;
}

#[derive(Serialize)]
struct KeyRequest<'a> {
    key_id: &'a str,
}

#[derive(Deserialize)]
struct KeyResponse {
    key: Jwk,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error_type: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
}

/// Fetches keys from the provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpKeyFetcher {
    client: reqwest::Client,
    config: ProviderConfig,
    endpoint: Url,
}

impl HttpKeyFetcher {
    /// Create a fetcher. Fails if the base URL is invalid or the client
    /// cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let endpoint = config.endpoint(VERIFICATION_KEY_PATH)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| crate::WebhookError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Key endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch_verification_key(
        &self,
        key_id: &str,
    ) -> std::result::Result<VerificationKey, CallError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("PLAID-CLIENT-ID", &self.config.client_id)
            .header("PLAID-SECRET", &self.config.secret)
            .json(&KeyRequest { key_id })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers(), Utc::now());
            return Err(match response.text().await {
                Ok(body) => provider_error(status.as_u16(), &body, retry_after),
                Err(e) => unreadable_body_error(status.as_u16(), &e.to_string(), retry_after),
            });
        }

        let body: KeyResponse = response
            .json()
            .await
            .map_err(|e| CallError::new(format!("invalid verification key response: {e}")))?;

        debug!(
            key_id = %key_id,
            request_id = body.request_id.as_deref().unwrap_or(""),
            "Fetched webhook verification key"
        );

        VerificationKey::from_jwk(&body.key).map_err(|e| CallError::new(e.to_string()))
    }
}

fn provider_error(status: u16, body: &str, retry_after: Option<Duration>) -> CallError {
    let mut error = match serde_json::from_str::<ProviderErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error_message
                .unwrap_or_else(|| format!("HTTP {status}"));
            let mut error = CallError::http(status, message);
            if let Some(error_type) = parsed.error_type {
                error = error.with_provider(error_type);
            }
            if let Some(code) = parsed.error_code {
                error = error.with_provider_code(code);
            }
            error
        }
        Err(_) => CallError::http(status, format!("HTTP {status}")),
    };

    if let Some(delay) = retry_after {
        error = error.with_retry_after(delay);
    }
    error
}

/// Keeps the status so classification still sees a 5xx or 429.
fn unreadable_body_error(status: u16, reason: &str, retry_after: Option<Duration>) -> CallError {
    let error = CallError::http(
        status,
        format!("HTTP {status}; failed to read response body: {reason}"),
    );
    match retry_after {
        Some(delay) => error.with_retry_after(delay),
        None => error,
    }
}

/// `Retry-After` as delta seconds (fractions allowed) or an HTTP date.
fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&Utc) - now).to_std().ok()
}

fn transport_error(err: reqwest::Error) -> CallError {
    let message = err.to_string();

    let code = if err.is_timeout() {
        NetworkCode::Timeout
    } else if source_chain_contains(&err, "dns error") {
        NetworkCode::NameNotFound
    } else if let Some(kind) = io_error_kind(&err) {
        match kind {
            io::ErrorKind::ConnectionReset => NetworkCode::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetworkCode::ConnectionAborted,
            io::ErrorKind::TimedOut => NetworkCode::Timeout,
            io::ErrorKind::ConnectionRefused => NetworkCode::Other("ECONNREFUSED".to_string()),
            other => NetworkCode::Other(format!("{other:?}")),
        }
    } else if err.is_connect() {
        NetworkCode::Other("ECONNECT".to_string())
    } else {
        return CallError::new(message);
    };

    CallError::network(code, message)
}

fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = inner.source();
    }
    None
}

fn source_chain_contains(err: &(dyn std::error::Error + 'static), needle: &str) -> bool {
    let mut current = Some(err);
    while let Some(inner) = current {
        if inner.to_string().contains(needle) {
            return true;
        }
        current = inner.source();
    }
    false
}

/// Serves keys from memory.
///
/// For tests and for deployments that pin keys out of band. Queued
/// failures are returned before any key lookup.
#[derive(Debug, Default)]
pub struct StaticKeyFetcher {
    keys: DashMap<String, VerificationKey>,
    failures: Mutex<VecDeque<CallError>>,
    fetches: AtomicUsize,
}

impl StaticKeyFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher serving the given keys.
    pub fn with_keys(keys: impl IntoIterator<Item = VerificationKey>) -> Self {
        let fetcher = Self::new();
        for key in keys {
            fetcher.insert(key);
        }
        fetcher
    }

    /// Add or replace a key.
    pub fn insert(&self, key: VerificationKey) {
        self.keys.insert(key.key_id().to_string(), key);
    }

    /// Remove a key.
    pub fn remove(&self, key_id: &str) {
        self.keys.remove(key_id);
    }

    /// Make the next fetch fail with `error`.
    pub async fn fail_next(&self, error: CallError) {
        self.failures.lock().await.push_back(error);
    }

    /// Number of fetches served so far, failures included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for StaticKeyFetcher {
    async fn fetch_verification_key(
        &self,
        key_id: &str,
    ) -> std::result::Result<VerificationKey, CallError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        self.keys
            .get(key_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                CallError::http(400, format!("unknown key id: {key_id}"))
                    .with_provider("INVALID_INPUT")
                    .with_provider_code("INVALID_WEBHOOK_VERIFICATION_KEY_ID")
            })
    }
}
