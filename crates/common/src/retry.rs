//! Exponential retry for non-streaming provider calls

use crate::errors::{AppError, Result};
use backoff::{future::retry, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;

const INITIAL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_INTERVAL: Duration = Duration::from_secs(5);

/// Run `op` until it succeeds, fails permanently, or has been retried
/// `max_retries` times.
///
/// Only errors for which [`AppError::is_transient`] holds are retried.
pub async fn with_retry<T, F, Fut>(operation: &'static str, max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(INITIAL_INTERVAL)
        .with_max_interval(MAX_INTERVAL)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt: u32 = 0;
    retry(policy, || {
        attempt += 1;
        let current = attempt;
        let fut = op();
        async move {
            fut.await.map_err(|e: AppError| {
                if e.is_transient() && current <= max_retries {
                    tracing::warn!(
                        operation,
                        attempt = current,
                        max_retries,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}
