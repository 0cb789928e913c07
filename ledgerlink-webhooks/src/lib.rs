//! Webhook Verification for Ledgerlink
//!
//! This crate verifies webhooks pushed by the upstream aggregation provider.
//! Each delivery carries a compact ES256 JWS in the `Plaid-Verification`
//! header whose claims commit to the SHA-256 of the body.
//!
//! # Features
//!
//! - **ES256 Verification**: Raw JWS signatures and JWK coordinates are turned
//!   into DER structures and checked with P-256 ECDSA
//! - **Key Caching**: Verification keys are cached with a TTL and fetched at
//!   most once per key id at a time
//! - **Key Rotation**: A cached key that fails verification is refetched once
//! - **Integrity & Freshness**: Body hash and token age are checked after the
//!   signature
//! - **Resilient Key Fetching**: Key retrieval is retried through
//!   `ledgerlink-retry`
//!
//! # Example
//!
//! ```rust,no_run
//! use ledgerlink_webhooks::{HttpKeyFetcher, ProviderConfig, VerifyOptions, WebhookVerifier};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = HttpKeyFetcher::new(ProviderConfig::from_env()?)?;
//!     let verifier = WebhookVerifier::new(Arc::new(fetcher));
//!
//!     let body = br#"{"webhook_type":"TRANSACTIONS"}"#;
//!     let header = Some("eyJhbGciOiJFUzI1NiIs...");
//!
//!     if let Some(claims) = verifier.verify(body, header, VerifyOptions::strict()).await? {
//!         println!("verified, issued at {:?}", claims.iat);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example: Signature Codec
//!
//! ```rust
//! use ledgerlink_webhooks::codec;
//!
//! let mut raw = [0u8; 64];
//! raw[31] = 0x01;
//! raw[63] = 0x7f;
//!
//! let signature = codec::build_signature(&raw);
//! assert_eq!(signature.as_der(), &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x7f]);
//! ```

mod cache;
pub mod codec;
mod config;
mod error;
mod fetcher;
mod key;
mod token;
mod verifier;

pub use cache::{DEFAULT_KEY_TTL, InMemoryKeyCache, KeyCache};
pub use config::{
    DEFAULT_MAX_TOKEN_AGE, DEFAULT_VERIFICATION_HEADER, KEY_FETCH_LABEL, ProviderConfig,
    ProviderEnvironment, VerifierConfig, VerifierConfigBuilder,
};
pub use error::{FailureKind, WebhookError};
pub use fetcher::{HttpKeyFetcher, KeyFetcher, StaticKeyFetcher, VERIFICATION_KEY_PATH};
pub use key::{Jwk, P256_CURVE, VerificationKey};
pub use token::{ES256, SignedWebhookToken, TokenHeader, WebhookClaims};
pub use verifier::{KeySource, VerifyOptions, WebhookVerifier};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
