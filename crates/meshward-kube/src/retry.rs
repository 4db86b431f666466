//! Call policies: fixed-delay retries and optional time bounds

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{MeshError, Result};

/// Run `op` up to `config.attempts` times, sleeping `config.delay` between tries
///
/// Only errors accepted by `retryable` are retried; anything else is returned
/// immediately. The last error is returned once the budget is spent.
pub async fn retry_with<T, F, Fut, P>(config: &RetryConfig, retryable: P, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&MeshError) -> bool,
{
    let attempts = config.attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && retryable(&e) => {
                tracing::debug!(attempt, attempts, error = %e, "retrying");
                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Await `fut`, failing with `MeshError::Timeout` once `limit` expires
///
/// Without a limit the call is awaited for as long as it takes.
pub async fn bounded<T, Fut>(operation: &str, limit: Option<Duration>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| MeshError::Timeout {
                operation: operation.to_string(),
                after,
            })?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with(&fast(5), MeshError::is_conflict, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(MeshError::Conflict { name: "default".to_string() })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with(&fast(2), MeshError::is_conflict, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MeshError::Conflict { name: "default".to_string() }) }
        })
        .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_aborts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with(&fast(5), MeshError::is_conflict, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MeshError::Collaborator("forbidden".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_without_limit() {
        let value = bounded("read", None, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded("install", Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, MeshError::Timeout { .. }));
        assert_eq!(err.to_string(), "install timed out after 10ms");
    }
}
