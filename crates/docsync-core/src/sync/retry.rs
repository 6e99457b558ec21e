//! Timeout and exponential backoff around store calls

use std::future::Future;

use backoff::backoff::Backoff;
use tracing::warn;

use crate::config::RetryConfig;
use crate::{Error, Result};

/// Run `call` under the configured timeout, retrying transient failures.
///
/// A timeout counts as a transient failure. Non-transient errors return
/// immediately; transient ones are retried until `max_attempts` calls
/// have been made.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut schedule = config.backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(config.timeout(), call()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: operation.to_string(),
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = schedule
                    .next_backoff()
                    .unwrap_or_else(|| std::time::Duration::from_millis(config.max_backoff_ms));
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "store call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(operation, attempt, error = %e, "store call failed after all retries");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
            timeout_ms: 1_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&config(4), "write", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::transient("write", "503"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(&config(3), "write", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::transient("write", "503"))
        })
        .await;

        assert!(matches!(result, Err(Error::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejections_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(&config(5), "write", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Rejected {
                operation: "write".into(),
                message: "bad schema".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(Error::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let result: Result<()> = with_retry(&config(2), "list", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }
}
