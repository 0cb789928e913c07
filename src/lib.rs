// Ledgerlink - trust layer for inbound aggregation-provider webhooks
//
// Re-exports the resilient call wrapper and, behind the `webhooks` feature,
// the ES256 webhook verifier.

// Re-export retry functionality
pub use ledgerlink_retry::*;

// Re-export optional crates
#[cfg(feature = "webhooks")]
pub use ledgerlink_webhooks;

// Prelude for common imports
pub mod prelude {
    pub use crate::{CallError, Classification, RetryPolicy, Transient, classify, execute};

    #[cfg(feature = "webhooks")]
    pub use ledgerlink_webhooks::{
        FailureKind, HttpKeyFetcher, InMemoryKeyCache, KeyCache, KeyFetcher, ProviderConfig,
        VerificationKey, VerifierConfig, VerifyOptions, WebhookClaims, WebhookError,
        WebhookVerifier,
    };
}
