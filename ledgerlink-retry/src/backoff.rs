//! Exponential backoff with jitter and server retry hints.

use rand::Rng;
use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound for any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Default jitter, as a fraction of the base delay.
pub const DEFAULT_JITTER_FACTOR: f64 = 0.5;

/// Pre-jitter delay for a zero-indexed attempt: `base_delay * 2^attempt`.
pub fn exponential_delay(attempt: u32, base_delay: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base_delay.saturating_mul(factor)
}

/// Compute the wait before retrying after `attempt` failed.
pub fn delay(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    server_hint: Option<Duration>,
) -> Duration {
    delay_with_rng(
        &mut rand::rng(),
        attempt,
        base_delay,
        max_delay,
        jitter_factor,
        server_hint,
    )
}

/// Same as [`delay`], drawing jitter from the given generator.
pub fn delay_with_rng<R: Rng>(
    rng: &mut R,
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    server_hint: Option<Duration>,
) -> Duration {
    let mut delay = exponential_delay(attempt, base_delay);

    if let Some(hint) = server_hint
        && hint > delay
    {
        delay = hint;
    }

    // Jitter is relative to the configured base, not the grown delay.
    let jitter_ceiling_ms = base_delay.as_millis() as f64 * jitter_factor;
    let jitter_ms = if jitter_ceiling_ms.is_finite() && jitter_ceiling_ms > 0.0 {
        rng.random_range(0.0..jitter_ceiling_ms)
    } else {
        0.0
    };

    let total_ms = delay.as_millis() as f64 + jitter_ms;
    let capped_ms = total_ms.min(max_delay.as_millis() as f64);
    Duration::from_millis(capped_ms as u64)
}
