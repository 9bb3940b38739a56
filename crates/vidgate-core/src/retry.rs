//! Bounded retry with exponential backoff and jitter.
//!
//! Used for transient dependency-connection issues only. Data-integrity
//! failures are terminal and must not pass through here.

use rand::Rng;
use std::time::Duration;

/// Cap applied to the exponential term so high attempt counts do not produce
/// excessively long delays.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Backoff for a given attempt (0-based): exponential on `base_ms`, capped,
/// with up to 50% random jitter added to decorrelate retrying peers.
pub fn backoff_with_jitter(attempt: u32, base_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(16)).min(MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=exp / 2);
    Duration::from_millis(exp + jitter)
}

/// Run `op` up to `max_attempts` times, sleeping with backoff between
/// failures. Returns the last error when all attempts fail.
pub async fn retry_bounded<T, E, F, Fut>(
    max_attempts: u32,
    base_ms: u64,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts => {
                let delay = backoff_with_jitter(attempt, base_ms);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
