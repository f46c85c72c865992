//! Fixed-interval polling for asynchronous platform jobs
//!
//! Ingestion jobs and collections are created asynchronously; callers
//! check their status, sleep, and check again until a terminal state.

use crate::{KbError, Result};
use std::future::Future;
use std::time::Duration;

/// Poll `probe` every `interval` until `is_terminal` accepts its value.
///
/// The first check happens immediately. Probe errors abort polling.
/// Returns `KbError::Timeout` after `max_attempts` non-terminal checks;
/// `None` polls forever.
pub async fn poll_until<T, F, Fut, P>(
    what: &str,
    interval: Duration,
    max_attempts: Option<u32>,
    mut probe: F,
    is_terminal: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let value = probe().await?;
        if is_terminal(&value) {
            tracing::debug!(what, attempt, "reached terminal state");
            return Ok(value);
        }

        if let Some(max) = max_attempts {
            if attempt >= max {
                return Err(KbError::Timeout(format!(
                    "{what} did not finish after {attempt} checks"
                )));
            }
        }

        tracing::debug!(what, attempt, ?interval, "not finished, sleeping");
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_poll_until_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let status = poll_until(
            "ingestion",
            Duration::from_millis(1),
            Some(10),
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(if n >= 3 { "COMPLETE" } else { "IN_PROGRESS" })
                }
            },
            |s| *s == "COMPLETE",
        )
        .await
        .unwrap();

        assert_eq!(status, "COMPLETE");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let result = poll_until(
            "collection",
            Duration::from_millis(1),
            Some(2),
            || async { Ok("CREATING") },
            |s| *s == "ACTIVE",
        )
        .await;

        assert!(matches!(result, Err(KbError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_poll_until_propagates_probe_error() {
        let result: Result<&str> = poll_until(
            "collection",
            Duration::from_millis(1),
            None,
            || async { Err(KbError::NotFound("collection".into())) },
            |_| true,
        )
        .await;

        assert!(matches!(result, Err(KbError::NotFound(_))));
    }
}
