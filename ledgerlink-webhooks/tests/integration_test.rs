//! Integration tests for ledgerlink-webhooks

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ledgerlink_retry::RetryPolicy;
use ledgerlink_webhooks::codec::{build_public_key, build_signature, verify};
use ledgerlink_webhooks::*;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_700_000_000;

fn signing_key(seed: &str) -> SigningKey {
    SigningKey::from_slice(&Sha256::digest(seed.as_bytes())).unwrap()
}

fn coordinates(key: &SigningKey) -> ([u8; 32], [u8; 32]) {
    let point = key.verifying_key().to_encoded_point(false);
    (
        point.x().unwrap().as_slice().try_into().unwrap(),
        point.y().unwrap().as_slice().try_into().unwrap(),
    )
}

fn jwk(kid: &str, key: &SigningKey) -> Value {
    let (x, y) = coordinates(key);
    json!({
        "alg": "ES256",
        "created_at": 1560466150,
        "crv": "P-256",
        "expired_at": null,
        "kid": kid,
        "kty": "EC",
        "use": "sig",
        "x": URL_SAFE_NO_PAD.encode(x),
        "y": URL_SAFE_NO_PAD.encode(y),
    })
}

fn sign_token(kid: &str, key: &SigningKey, body: &[u8], iat: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&json!({"alg": "ES256", "kid": kid, "typ": "JWT"})).unwrap(),
    );
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&json!({
            "request_body_sha256": hex::encode(Sha256::digest(body)),
            "iat": iat,
        }))
        .unwrap(),
    );
    let signature: Signature = key.sign(format!("{header}.{payload}").as_bytes());
    format!(
        "{header}.{payload}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

fn http_verifier(server: &MockServer) -> WebhookVerifier {
    let provider = ProviderConfig::new("client-id", "secret").with_base_url(server.uri());
    let fetcher = HttpKeyFetcher::new(provider).unwrap();
    let config = VerifierConfig::builder()
        .key_fetch_retry(
            RetryPolicy::new(KEY_FETCH_LABEL)
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(5)),
        )
        .build();
    WebhookVerifier::with_config(Arc::new(fetcher), config)
}

async fn mount_key(server: &MockServer, kid: &str, key: &SigningKey, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/webhook_verification_key/get"))
        .and(body_json(json!({"key_id": kid})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"key": jwk(kid, key), "request_id": "req"})),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[test]
fn test_codec_round_trip_many_keys() {
    for i in 0..16 {
        let key = signing_key(&format!("key-{i}"));
        let (x, y) = coordinates(&key);
        let message = format!("header-{i}.payload-{i}");

        let signature: Signature = key.sign(message.as_bytes());
        let raw: [u8; 64] = signature.to_bytes().as_slice().try_into().unwrap();

        assert!(verify(
            &build_public_key(&x, &y),
            &build_signature(&raw),
            message.as_bytes()
        ));
    }
}

#[tokio::test]
async fn test_first_delivery_over_http() {
    let server = MockServer::start().await;
    let key = signing_key("primary");
    mount_key(&server, "kid-1", &key, 1).await;

    let verifier = http_verifier(&server);
    let body = br#"{"webhook_type":"ITEM","webhook_code":"WEBHOOK_UPDATE_ACKNOWLEDGED"}"#;
    let token = sign_token("kid-1", &key, body, NOW - 30);

    for _ in 0..3 {
        let claims = verifier
            .verify_at(body, Some(&token), VerifyOptions::strict(), NOW)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claims.iat, Some(NOW - 30));
    }
}

#[tokio::test]
async fn test_rotated_key_over_http() {
    let server = MockServer::start().await;
    let old = signing_key("old");
    let new = signing_key("new");
    mount_key(&server, "kid-1", &new, 1).await;

    let verifier = http_verifier(&server);
    let (x, y) = coordinates(&old);
    verifier
        .cache()
        .put("kid-1", VerificationKey::new("kid-1", x, y))
        .await;

    let body = b"{}";
    let token = sign_token("kid-1", &new, body, NOW);
    let result = verifier
        .verify_at(body, Some(&token), VerifyOptions::strict(), NOW)
        .await;

    assert!(result.unwrap().is_some());
}

#[tokio::test]
async fn test_transient_key_endpoint_failure_recovers() {
    let server = MockServer::start().await;
    let key = signing_key("primary");
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error_type": "API_ERROR",
            "error_code": "INTERNAL_SERVER_ERROR",
            "error_message": "an unexpected error occurred"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_key(&server, "kid-1", &key, 1).await;

    let verifier = http_verifier(&server);
    let body = b"payload";
    let token = sign_token("kid-1", &key, body, NOW);

    assert!(
        verifier
            .verify_at(body, Some(&token), VerifyOptions::strict(), NOW)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_unknown_key_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_type": "INVALID_INPUT",
            "error_code": "INVALID_WEBHOOK_VERIFICATION_KEY_ID",
            "error_message": "invalid key_id provided"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let verifier = http_verifier(&server);
    let key = signing_key("primary");
    let token = sign_token("unknown", &key, b"{}", NOW);

    let err = verifier
        .verify_at(b"{}", Some(&token), VerifyOptions::strict(), NOW)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::KeyFetchFailure);
    assert!(err.to_string().contains("invalid key_id provided"));
}

#[tokio::test]
async fn test_body_hash_mismatch_with_valid_signature() {
    let key = signing_key("primary");
    let (x, y) = coordinates(&key);
    let fetcher = StaticKeyFetcher::with_keys([VerificationKey::new("kid-1", x, y)]);
    let verifier = WebhookVerifier::new(Arc::new(fetcher));

    let token = sign_token("kid-1", &key, b"original body", NOW);
    let err = verifier
        .verify_at(b"original bodY", Some(&token), VerifyOptions::strict(), NOW)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::BodyHashMismatch);
}

#[tokio::test]
async fn test_header_policy() {
    let verifier = WebhookVerifier::new(Arc::new(StaticKeyFetcher::new()));

    assert_eq!(
        verifier
            .verify(b"{}", None, VerifyOptions::lenient())
            .await
            .unwrap(),
        None
    );
    assert!(matches!(
        verifier.verify(b"{}", None, VerifyOptions::strict()).await,
        Err(WebhookError::MissingHeader)
    ));
}
