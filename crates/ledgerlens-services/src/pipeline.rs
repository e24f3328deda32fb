//! Seams to the categorization and document-extraction pipelines.
//!
//! Both run outside this service. The defaults keep rows as parsed.

use async_trait::async_trait;

use ledgerlens_core::models::Transaction;
use ledgerlens_core::AppError;
use ledgerlens_processing::DetectedType;

/// Assigns categories to parsed transactions.
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, rows: Vec<Transaction>) -> Result<Vec<Transaction>, AppError>;
}

/// Turns PDF and image statements into rows.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(
        &self,
        detected: DetectedType,
        data: &[u8],
        max_rows: usize,
    ) -> Result<Vec<Transaction>, AppError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughCategorizer;

#[async_trait]
impl Categorizer for PassthroughCategorizer {
    async fn categorize(&self, rows: Vec<Transaction>) -> Result<Vec<Transaction>, AppError> {
        Ok(rows)
    }
}

/// Extractor used when no document pipeline is wired in: accepts the file
/// and yields no rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopExtractor;

#[async_trait]
impl DocumentExtractor for NoopExtractor {
    async fn extract(
        &self,
        detected: DetectedType,
        data: &[u8],
        _max_rows: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        tracing::debug!(
            detected = %detected,
            size_bytes = data.len(),
            "No document extractor configured"
        );
        Ok(Vec::new())
    }
}
