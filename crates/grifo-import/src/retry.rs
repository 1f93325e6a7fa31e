//! Retry with exponential backoff for transient rehost failures.
//!
//! Network-level errors, 429s, and 5xx responses are retried; everything
//! else (wrong content type, oversized bodies, missing configuration) is
//! propagated immediately.

use std::future::Future;
use std::time::Duration;

use crate::rehost::RehostError;

fn is_retriable(err: &RehostError) -> bool {
    match err {
        RehostError::Http(_) => true,
        RehostError::UnexpectedStatus { status, .. } | RehostError::UploadFailed { status, .. } => {
            *status == 429 || (500..600).contains(status)
        }
        _ => false,
    }
}

/// Executes `operation`, sleeping `backoff_base_secs * 2^attempt` seconds
/// between retries of transient errors, up to `max_retries` additional
/// attempts after the first. The last error is returned when retries run
/// out.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, RehostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RehostError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        // Cap the shift so extreme configs saturate instead of overflowing.
        let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %last_err,
            "transient rehost error; retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn server_error(status: u16) -> RehostError {
        RehostError::UnexpectedStatus {
            status,
            url: "https://img.example.com/a.jpg".to_owned(),
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, RehostError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(server_error(503))
                } else {
                    Ok::<u32, RehostError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(2, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, RehostError>(server_error(429))
            }
        })
        .await;
        // max_retries=2 means 3 total attempts
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(RehostError::UnexpectedStatus { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, RehostError>(server_error(404))
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RehostError::UnexpectedStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_content_type_rejections() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, RehostError>(RehostError::NotAnImage {
                    url: "https://img.example.com/a.jpg".to_owned(),
                    content_type: "text/html".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RehostError::NotAnImage { .. })));
    }
}
