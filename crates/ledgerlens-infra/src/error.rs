//! Store error type
//!
//! Failures from any backing store (rate buckets, bans, codes, sessions). Callers
//! decide per concern whether a failure fails open or closed.

use std::time::Duration;

use ledgerlens_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::InternalWithSource {
            message: "Backing store failure".to_string(),
            source: anyhow::Error::new(err),
        }
    }
}
