//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::DeltaError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, DeltaError>>,
) -> Result<T, DeltaError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(DeltaError::Timeout(duration.as_millis() as u64)),
    }
}

/// Like [`with_timeout`], but waits indefinitely when `duration` is `None`.
pub async fn with_optional_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, DeltaError>>,
) -> Result<T, DeltaError> {
    match duration {
        Some(duration) => with_timeout(duration, future).await,
        None => future.await,
    }
}
