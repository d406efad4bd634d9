//! Retry policy for provider calls.
//!
//! A single policy type applied uniformly to transcription, embedding, and
//! LLM backends: bounded attempts, exponential backoff with a cap, and a
//! jitter factor to de-synchronize concurrent retries.

use crate::error::{KvissError, Result};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Exponential backoff policy with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Jitter factor: each delay is scaled by a value in [1 - j, 1 + j].
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Policy used for LLM calls: two retries after the initial attempt.
    pub fn llm() -> Self {
        Self {
            max_attempts: 3,
            ..Self::default()
        }
    }

    /// Backoff delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.as_secs_f64() * 2f64.powi(exp as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped * self.jitter_factor())
    }

    // Derived from the clock's subsecond nanos; enough to spread retries out
    // without carrying a PRNG dependency.
    fn jitter_factor(&self) -> f64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let unit = f64::from(nanos) / f64::from(u32::MAX);
        1.0 + self.jitter * (unit * 2.0 - 1.0)
    }
}

/// Whether an error is worth retrying.
///
/// Retryable: transport errors, timeouts, provider 5xx/408/429. Everything
/// else (other 4xx, decode errors, local failures) fails immediately.
pub fn is_retryable(err: &KvissError) -> bool {
    match err {
        KvissError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().is_some_and(|s| {
                    s.is_server_error() || s.as_u16() == 408 || s.as_u16() == 429
                })
        }
        KvissError::Timeout(_) | KvissError::ProviderUnavailable(_) => true,
        _ => false,
    }
}

/// Run `op`, retrying retryable failures per the policy.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                    what,
                    attempt,
                    policy.max_attempts,
                    delay.as_secs_f64(),
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
