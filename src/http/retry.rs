//! Retry policies for failed requests.
//!
//! Reads and writes retry differently: reads are retried on server errors,
//! lost connections, timeouts (408) and rate limits (429), writes only on
//! server errors and lost connections. A 401 is never retried here; it is
//! resolved by the token refresh inside each attempt.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use super::error::{ApiError, ErrorKind};

/// Retries allowed for reads.
pub const QUERY_MAX_RETRIES: u32 = 3;
/// Retries allowed for writes.
pub const MUTATION_MAX_RETRIES: u32 = 1;

/// Delay before the first retry; doubled for every further one.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Upper bound for a single backoff delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

const QUERY_RETRYABLE_CLIENT_ERRORS: &[u16] = &[408, 429];

/// When, and how often, a failed request is sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    retryable_client_errors: &'static [u16],
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Every failure is final.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: RETRY_BASE_DELAY,
            max_delay: RETRY_MAX_DELAY,
            retryable_client_errors: &[],
        }
    }

    /// Policy for reads.
    pub const fn query() -> Self {
        Self {
            max_retries: QUERY_MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
            max_delay: RETRY_MAX_DELAY,
            retryable_client_errors: QUERY_RETRYABLE_CLIENT_ERRORS,
        }
    }

    /// Policy for writes: never retried on a 4xx.
    pub const fn mutation() -> Self {
        Self {
            max_retries: MUTATION_MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
            max_delay: RETRY_MAX_DELAY,
            retryable_client_errors: &[],
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Backoff before retry number `retry` (zero-based): `base * 2^retry`,
    /// capped at `max_delay`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether a request that already used `retries` retries and then
    /// failed with `error` gets another attempt.
    pub fn should_retry(&self, retries: u32, error: &ApiError) -> bool {
        if retries >= self.max_retries {
            return false;
        }

        match error.status {
            Some(status) if (400..500).contains(&status) => {
                self.retryable_client_errors.contains(&status)
            }
            Some(_) => true,
            None => error.kind == ErrorKind::NetworkUnavailable,
        }
    }
}

/// Runs `operation` until it succeeds or `policy` gives up.
pub(super) async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if policy.should_retry(retries, &e) => {
                let delay = policy.delay(retries);
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                    operation_name,
                    retries + 1,
                    policy.max_retries + 1,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => {
                if retries > 0 {
                    debug!("{}: giving up after {} retries", operation_name, retries);
                }
                return Err(e);
            }
        }
    }
}
