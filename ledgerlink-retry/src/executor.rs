//! Resilient call wrapper.

use crate::{RetryEvent, RetryPolicy, Transient};
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

/// Run `operation` until it succeeds, fails terminally, or the policy's
/// retry bound is reached.
///
/// At most `policy.max_retries + 1` attempts are made. The error returned is
/// always the one produced by the final attempt, unmodified. Sleeping between
/// attempts suspends only the calling task.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        label = %policy.label,
                        attempts = attempt + 1,
                        "Upstream call succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if !policy.should_retry(attempt) || !err.classification().is_retryable() {
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt, err.retry_after());
                warn!(
                    label = %policy.label,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Upstream call failed, retrying"
                );
                policy.notify(&RetryEvent {
                    label: policy.label.clone(),
                    attempt,
                    max_retries: policy.max_retries,
                    delay,
                    error: err.to_string(),
                });

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallError, NetworkCode};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new("test")
            .with_max_retries(max_retries)
            .without_jitter()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, CallError> = execute(&policy(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = execute(&policy(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(CallError::http(503, "unavailable"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms of backoff under paused time
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CallError> = execute(&policy(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CallError::http(400, "bad request").with_provider("INVALID_REQUEST"))
        })
        .await;

        assert_eq!(result.unwrap_err().status, Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CallError> = execute(&policy(2), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(CallError::network(
                NetworkCode::Timeout,
                format!("attempt {n} timed out"),
            ))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().message, "attempt 2 timed out");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), CallError> = execute(&RetryPolicy::none(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CallError::http(500, "boom"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_each_retry() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let policy = policy(3).with_observer(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let _: Result<(), CallError> =
            execute(&policy, || async { Err(CallError::http(502, "bad gateway")) }).await;

        let events = events.lock().unwrap();
        let attempts: Vec<u32> = events.iter().map(|e| e.attempt).collect();
        let delays: Vec<u64> = events.iter().map(|e| e.delay.as_millis() as u64).collect();
        assert_eq!(attempts, vec![0, 1, 2]);
        assert_eq!(delays, vec![500, 1000, 2000]);
        assert!(events.iter().all(|e| e.label == "test" && e.error == "bad gateway"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_is_honoured() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let policy = policy(1).with_max_delay(Duration::from_secs(60));

        let result = execute(&policy, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CallError::http(429, "rate limited").with_retry_after(Duration::from_secs(30)))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
