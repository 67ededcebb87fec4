//! Fixed-delay retry logic
//!
//! Every failed attempt except the last is followed by a fixed pause. The error
//! returned after the budget is spent is the one from the last attempt; earlier
//! errors are only logged.
//!
//! # Example
//!
//! ```no_run
//! use product_harvest::retry::retry_fixed;
//! use product_harvest::config::RetryConfig;
//!
//! # async fn example() -> Result<(), String> {
//! let config = RetryConfig::default();
//! let value = retry_fixed(&config, |attempt| async move {
//!     // Your operation here
//!     Ok::<_, String>(attempt)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::fetcher::RecordSource;
use crate::types::{ErrorCategory, Outcome, ProductId};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Run `operation` until it succeeds or `config.max_attempts` attempts have failed
///
/// The closure receives the 1-based attempt number. A `max_attempts` of zero is
/// treated as one attempt.
pub async fn retry_fixed<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = config.delay.as_millis(),
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(e);
            }
        }
    }
}

/// Resolve one identifier to its terminal [`Outcome`]
///
/// Never fails: the last attempt's error is classified into an [`ErrorCategory`].
/// A source that panics ends resolution at once and is recorded as
/// [`ErrorCategory::Unknown`], so the identifier still yields an outcome.
pub async fn resolve(source: &dyn RecordSource, config: &RetryConfig, id: ProductId) -> Outcome {
    let result = AssertUnwindSafe(retry_fixed(config, |attempt| {
        let id = &id;
        async move {
            tracing::trace!(product_id = %id, attempt, "Fetching record");
            source.fetch(id).await
        }
    }))
    .catch_unwind()
    .await;

    match result {
        Ok(Ok(record)) => {
            tracing::debug!(product_id = %id, "Fetched record");
            Outcome::Success { id, record }
        }
        Ok(Err(e)) => Outcome::Failure {
            id,
            category: e.category(),
        },
        Err(panic) => {
            tracing::error!(
                product_id = %id,
                reason = panic_message(panic.as_ref()),
                "Record source panicked"
            );
            Outcome::Failure {
                id,
                category: ErrorCategory::Unknown,
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
