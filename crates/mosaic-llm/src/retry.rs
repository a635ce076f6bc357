//! Bounded retry with a per-attempt timeout

use std::future::Future;
use std::time::Duration;

use crate::error::{LlmError, TransportFailure};

/// Pause before the first retry; later retries wait proportionally longer
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Run `attempt` until it succeeds, fails permanently, or the budget is spent
///
/// Each attempt gets the full `timeout`. Transient failures are retried up
/// to `max_retries` times, so at most `max_retries + 1` attempts are made.
/// Attempts are numbered from 1.
pub async fn with_retry<T, F, Fut>(
    provider: &str,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
    mut attempt: F,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportFailure>>,
{
    let mut number = 0;

    loop {
        number += 1;

        let failure = match tokio::time::timeout(timeout, attempt(number)).await {
            Ok(Ok(value)) => {
                if number > 1 {
                    tracing::debug!(provider, attempts = number, "backend call succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(failure)) => failure,
            Err(_) => TransportFailure::Timeout(timeout),
        };

        if !failure.is_transient() {
            tracing::warn!(provider, attempt = number, error = %failure, "backend call failed permanently");
            return Err(LlmError::from_failure(failure, number));
        }

        if number > max_retries {
            tracing::warn!(provider, attempts = number, error = %failure, "retry budget exhausted");
            return Err(LlmError::from_failure(failure, number));
        }

        tracing::warn!(provider, attempt = number, error = %failure, "transient backend failure, retrying");
        tokio::time::sleep(backoff.saturating_mul(number)).await;
    }
}
