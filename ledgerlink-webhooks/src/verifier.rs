//! Webhook verification pipeline.
//!
//! A delivery moves through parse, key resolution, signature check (with at
//! most one stale-key refetch), body hash check and freshness check. Any step
//! can end it with a typed [`WebhookError`].

use crate::cache::{InMemoryKeyCache, KeyCache};
use crate::codec::{self, StructuredSignature};
use crate::config::VerifierConfig;
use crate::fetcher::KeyFetcher;
use crate::key::VerificationKey;
use crate::token::{SignedWebhookToken, WebhookClaims};
use crate::{Result, WebhookError};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Per-call verification options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Treat an absent verification header as a failure.
    pub strict: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl VerifyOptions {
    /// Absent header fails with [`WebhookError::MissingHeader`].
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Absent header yields `Ok(None)`.
    pub fn lenient() -> Self {
        Self { strict: false }
    }
}

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Cached,
    Fetched,
}

/// Verifies signed webhook deliveries.
///
/// Cheap to clone; clones share the key cache and in-flight fetches.
#[derive(Clone)]
pub struct WebhookVerifier {
    fetcher: Arc<dyn KeyFetcher>,
    cache: Arc<dyn KeyCache>,
    config: Arc<VerifierConfig>,
    inflight: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl WebhookVerifier {
    /// Create a verifier with default configuration.
    pub fn new(fetcher: Arc<dyn KeyFetcher>) -> Self {
        Self::with_config(fetcher, VerifierConfig::default())
    }

    /// Create a verifier with an in-memory cache using `config.key_ttl`.
    pub fn with_config(fetcher: Arc<dyn KeyFetcher>, config: VerifierConfig) -> Self {
        Self {
            fetcher,
            cache: Arc::new(InMemoryKeyCache::with_ttl(config.key_ttl)),
            config: Arc::new(config),
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Replace the key cache.
    pub fn with_cache(mut self, cache: Arc<dyn KeyCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Verifier configuration.
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Key cache in use.
    pub fn cache(&self) -> &Arc<dyn KeyCache> {
        &self.cache
    }

    /// Verify a delivery against the current time.
    ///
    /// `header` is the raw verification header value. Returns the verified
    /// claims, or `None` when the header is absent and `options` is lenient.
    pub async fn verify(
        &self,
        body: &[u8],
        header: Option<&str>,
        options: VerifyOptions,
    ) -> Result<Option<WebhookClaims>> {
        self.verify_at(body, header, options, chrono::Utc::now().timestamp())
            .await
    }

    /// Verify a delivery as of `now` (unix seconds).
    pub async fn verify_at(
        &self,
        body: &[u8],
        header: Option<&str>,
        options: VerifyOptions,
        now: i64,
    ) -> Result<Option<WebhookClaims>> {
        let Some(token) = header.map(str::trim).filter(|value| !value.is_empty()) else {
            if options.strict {
                debug!("Webhook rejected: verification header missing");
                return Err(WebhookError::MissingHeader);
            }
            warn!("Webhook verification header missing, proceeding unverified");
            return Ok(None);
        };

        match self.verify_token(body, token, now).await {
            Ok(claims) => Ok(Some(claims)),
            Err(err) => {
                debug!(kind = err.kind().as_str(), error = %err, "Webhook rejected");
                Err(err)
            }
        }
    }

    /// Verify using the configured header, looked up case-insensitively.
    pub async fn verify_from_headers(
        &self,
        body: &[u8],
        headers: &HashMap<String, String>,
        options: VerifyOptions,
    ) -> Result<Option<WebhookClaims>> {
        let header = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.config.header_name))
            .map(|(_, value)| value.as_str());

        self.verify(body, header, options).await
    }

    async fn verify_token(&self, body: &[u8], token: &str, now: i64) -> Result<WebhookClaims> {
        let parsed = SignedWebhookToken::parse(token)?;
        let key_id = parsed.key_id();
        let signing_input = parsed.signing_input();
        let signature = codec::build_signature(parsed.signature());

        let (key, source) = self.resolve_key(key_id).await?;
        if !signature_matches(&key, &signature, &signing_input) {
            if source == KeySource::Fetched {
                return Err(WebhookError::InvalidSignature);
            }

            // The provider may have rotated the key; refetch exactly once.
            debug!(key_id = %key_id, "Cached key failed verification, refetching");
            self.cache.evict(key_id).await;
            let (fresh, _) = self.resolve_key(key_id).await?;
            if !signature_matches(&fresh, &signature, &signing_input) {
                return Err(WebhookError::InvalidSignature);
            }
        }

        let claims = parsed.claims()?;
        check_body_hash(body, &claims.request_body_sha256)?;
        self.check_freshness(&claims, now)?;
        Ok(claims)
    }

    async fn resolve_key(&self, key_id: &str) -> Result<(VerificationKey, KeySource)> {
        if let Some(key) = self.cache.get(key_id).await {
            debug!(key_id = %key_id, "Verification key cache hit");
            return Ok((key, KeySource::Cached));
        }

        let lock = Arc::clone(&self.inflight.entry(key_id.to_string()).or_default());
        let result = self.fetch_single_flight(key_id, &lock).await;

        drop(lock);
        self.inflight
            .remove_if(key_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn fetch_single_flight(
        &self,
        key_id: &str,
        lock: &Mutex<()>,
    ) -> Result<(VerificationKey, KeySource)> {
        let _guard = lock.lock().await;

        // Another task may have fetched while we waited.
        if let Some(key) = self.cache.get(key_id).await {
            return Ok((key, KeySource::Cached));
        }

        debug!(key_id = %key_id, "Verification key cache miss, fetching");
        let key = ledgerlink_retry::execute(&self.config.key_fetch_retry, || {
            self.fetcher.fetch_verification_key(key_id)
        })
        .await
        .map_err(WebhookError::KeyFetchFailure)?;

        self.cache.put(key_id, key.clone()).await;
        Ok((key, KeySource::Fetched))
    }

    fn check_freshness(&self, claims: &WebhookClaims, now: i64) -> Result<()> {
        let Some(iat) = claims.iat else {
            warn!("Webhook token has no iat claim, skipping freshness check");
            return Ok(());
        };

        let max_age_secs = self.config.max_token_age.as_secs();
        let age_secs = now.saturating_sub(iat);
        if age_secs > i64::try_from(max_age_secs).unwrap_or(i64::MAX) {
            return Err(WebhookError::StaleToken {
                age_secs,
                max_age_secs,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("config", &self.config)
            .field("inflight", &self.inflight.len())
            .finish_non_exhaustive()
    }
}

fn signature_matches(
    key: &VerificationKey,
    signature: &StructuredSignature,
    signing_input: &str,
) -> bool {
    codec::verify(&key.structured(), signature, signing_input.as_bytes())
}

fn check_body_hash(body: &[u8], claimed: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(body));
    if constant_time_compare(&actual, &claimed.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(WebhookError::BodyHashMismatch)
    }
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
