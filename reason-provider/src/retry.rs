//! Retry/backoff engine (C5, §4.3, §7).
//!
//! Generic over any fallible async operation that produces a
//! [`ProviderError`] — provider adapters wrap their single-attempt HTTP call
//! with [`retry`]. Bounded exponential backoff: `base * 2^attempt`, capped at
//! `max_delay`; `max_attempts` ordinary attempts, plus `rate_limit_attempts`
//! additional attempts granted only once a rate-limit response has actually
//! been observed (§4.3.4 "once ordinary attempts are exhausted and no
//! rate-limit has been seen, stop").
//!
//! Grounded on the generic `RetryConfig::delay_for_attempt` shape seen across
//! the retrieval pack's provider clients; this implementation drops jitter
//! (the spec's delay formula is exact: `base * 2^i`) and adds the
//! rate-limit-extends-the-budget rule the spec requires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Tunable retry parameters (§9 Open Questions: defaults 3 ordinary + 5
/// rate-limit attempts, base 2s, cap 30s — reasonable but not protocol-fixed).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Ordinary (non-rate-limit) attempt budget.
    pub max_attempts: u32,
    /// Extra attempts granted once a rate-limit response has been seen.
    pub rate_limit_attempts: u32,
    /// Base delay for the exponential backoff.
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20); // guard against overflow in 2^attempt
        let scaled = self.base_delay.saturating_mul(1u32 << shift);
        scaled.min(self.max_delay)
    }
}

/// Run `attempt` (given the zero-indexed attempt number) until it succeeds,
/// exhausts its attempt budget, or `cancel` fires.
///
/// The total attempt budget is `max_attempts`, extended by
/// `rate_limit_attempts` the moment any attempt returns a rate-limit error.
/// Non-retryable errors return immediately without consuming the backoff
/// sleep (§4.3.3: "Non-retryable HTTP errors return immediately").
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut rate_limited_seen = false;
    let mut i: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        match attempt(i).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.is_rate_limit() {
                    rate_limited_seen = true;
                }

                let attempts_used = i + 1;
                let budget = if rate_limited_seen {
                    policy.max_attempts + policy.rate_limit_attempts
                } else {
                    policy.max_attempts
                };

                if !err.is_retryable() || attempts_used >= budget {
                    return Err(err);
                }

                let delay = policy.delay_for(i);
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
                i += 1;
            }
        }
    }
}
