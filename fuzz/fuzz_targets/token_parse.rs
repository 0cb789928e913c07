//! Fuzz target for compact token parsing.
//!
//! Arbitrary header values must parse or fail with a typed error, never panic.

#![no_main]

use ledgerlink_webhooks::{SignedWebhookToken, WebhookError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    match SignedWebhookToken::parse(raw) {
        Ok(token) => {
            assert_eq!(token.header().alg, "ES256");
            assert!(!token.key_id().is_empty());

            let input = token.signing_input();
            assert_eq!(input.matches('.').count(), 1);

            let _ = token.claims();
        }
        Err(
            WebhookError::MalformedToken(_)
            | WebhookError::UnsupportedAlgorithm(_)
            | WebhookError::InvalidSignature,
        ) => {}
        Err(other) => panic!("unexpected parse error: {other:?}"),
    }
});
