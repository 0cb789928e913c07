//! Configuration for webhook verification and provider access

use crate::cache::DEFAULT_KEY_TTL;
use crate::{Result, WebhookError};
use ledgerlink_retry::RetryPolicy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Request header carrying the signed token
pub const DEFAULT_VERIFICATION_HEADER: &str = "Plaid-Verification";

/// Maximum accepted token age
pub const DEFAULT_MAX_TOKEN_AGE: Duration = Duration::from_secs(300);

/// Label used when logging verification key retries
pub const KEY_FETCH_LABEL: &str = "webhook_verification_key_get";

/// Configuration for the webhook verifier
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// How long a fetched key is trusted before it is fetched again
    pub key_ttl: Duration,

    /// Tokens whose `iat` is older than this are rejected
    pub max_token_age: Duration,

    /// Retry policy for verification key retrieval
    pub key_fetch_retry: RetryPolicy,

    /// Header looked up by `verify_from_headers`
    pub header_name: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            key_ttl: DEFAULT_KEY_TTL,
            max_token_age: DEFAULT_MAX_TOKEN_AGE,
            key_fetch_retry: RetryPolicy::new(KEY_FETCH_LABEL).with_max_retries(2),
            header_name: DEFAULT_VERIFICATION_HEADER.to_string(),
        }
    }
}

impl VerifierConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> VerifierConfigBuilder {
        VerifierConfigBuilder::new()
    }
}

/// Builder for VerifierConfig
#[derive(Debug, Clone, Default)]
pub struct VerifierConfigBuilder {
    config: VerifierConfig,
}

impl VerifierConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: VerifierConfig::default(),
        }
    }

    /// Set the key cache TTL
    pub fn key_ttl(mut self, ttl: Duration) -> Self {
        self.config.key_ttl = ttl;
        self
    }

    /// Set the maximum token age
    pub fn max_token_age(mut self, age: Duration) -> Self {
        self.config.max_token_age = age;
        self
    }

    /// Set the maximum token age in seconds
    pub fn max_token_age_secs(mut self, secs: u64) -> Self {
        self.config.max_token_age = Duration::from_secs(secs);
        self
    }

    /// Set the key fetch retry policy
    pub fn key_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.key_fetch_retry = policy;
        self
    }

    /// Disable key fetch retries
    pub fn no_retries(mut self) -> Self {
        self.config.key_fetch_retry = RetryPolicy::none().with_label(KEY_FETCH_LABEL);
        self
    }

    /// Set the verification header name
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.config.header_name = name.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> VerifierConfig {
        self.config
    }
}

/// Provider deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl ProviderEnvironment {
    /// API base URL for the environment
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.plaid.com",
            Self::Development => "https://development.plaid.com",
            Self::Production => "https://production.plaid.com",
        }
    }

    /// Environment name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl FromStr for ProviderEnvironment {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(WebhookError::Config(format!(
                "unknown provider environment: {other}"
            ))),
        }
    }
}

impl fmt::Display for ProviderEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and endpoint for the aggregation provider's API
#[derive(Clone)]
pub struct ProviderConfig {
    /// Target environment
    pub environment: ProviderEnvironment,

    /// Overrides the environment's base URL
    pub base_url: Option<String>,

    /// API client id
    pub client_id: String,

    /// API secret
    pub secret: String,

    /// Request timeout
    pub timeout: Duration,

    /// User-Agent header for outgoing requests
    pub user_agent: String,
}

impl ProviderConfig {
    /// Create a sandbox configuration
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            environment: ProviderEnvironment::default(),
            base_url: None,
            client_id: client_id.into(),
            secret: secret.into(),
            timeout: Duration::from_secs(30),
            user_agent: format!("ledgerlink-webhooks/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Load from the process environment, reading `.env` first if present.
    ///
    /// Reads `PLAID_CLIENT_ID`, `PLAID_SECRET`, `PLAID_ENV` and `PLAID_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| WebhookError::Config(format!("{name} is not set")))
        };

        let mut config = Self::new(required("PLAID_CLIENT_ID")?, required("PLAID_SECRET")?);
        if let Some(env) = lookup("PLAID_ENV").filter(|v| !v.is_empty()) {
            config.environment = env.parse()?;
        }
        if let Some(base_url) = lookup("PLAID_BASE_URL").filter(|v| !v.is_empty()) {
            config.base_url = Some(base_url);
        }
        Ok(config)
    }

    /// Set the environment
    pub fn with_environment(mut self, environment: ProviderEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL in effect
    pub fn endpoint_base(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    /// Absolute URL of an API path
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.endpoint_base().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| WebhookError::Config(format!("invalid base URL: {e}")))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
