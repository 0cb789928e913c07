//! Integration tests for ledgerlink-retry

use ledgerlink_retry::backoff::{self, exponential_delay};
use ledgerlink_retry::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[test]
fn test_classifier_table() {
    let retryable = [
        CallError::http(429, "rate limited"),
        CallError::http(500, "internal"),
        CallError::http(503, "unavailable"),
        CallError::network(NetworkCode::from_code("ETIMEDOUT"), "timed out"),
    ];
    for err in &retryable {
        assert_eq!(classify(err), Classification::Retryable, "{err:?}");
    }

    let terminal = [
        CallError::http(400, "bad request"),
        CallError::http(404, "not found"),
        CallError::http(400, "bad request").with_provider("INVALID_REQUEST"),
        CallError::http(500, "item").with_provider("ITEM_ERROR"),
    ];
    for err in &terminal {
        assert_eq!(classify(err), Classification::Terminal, "{err:?}");
    }
}

#[test]
fn test_backoff_growth_and_cap() {
    let base = Duration::from_millis(500);
    let max = Duration::from_millis(10_000);

    for n in 0..8 {
        assert_eq!(
            exponential_delay(n, base),
            Duration::from_millis(500 * 2u64.pow(n))
        );
        for _ in 0..50 {
            assert!(backoff::delay(n, base, max, 0.5, None) <= max);
        }
    }
}

#[test]
fn test_retry_after_overrides_computed_backoff() {
    // attempt 1 computes 1000ms; the 30s hint must win before the cap
    let d = backoff::delay(
        1,
        Duration::from_millis(500),
        Duration::from_secs(120),
        0.5,
        Some(Duration::from_secs(30)),
    );
    assert!(d >= Duration::from_millis(30_000));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_bound() {
    for max_retries in 0..4 {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new("bound").with_max_retries(max_retries);

        let result: Result<(), CallError> = execute(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CallError::network(NetworkCode::ConnectionReset, "reset"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
    }
}
