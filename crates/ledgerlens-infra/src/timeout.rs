use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Run a store call with an upper bound on its latency.
pub async fn with_store_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
