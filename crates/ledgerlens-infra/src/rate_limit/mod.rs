//! Rate limiting
//!
//! Token buckets keyed by global, IP, hashed email and verify-attempt scopes, plus
//! a ban list. State lives behind [`RateStore`]: in process for a single
//! instance, or in Postgres when several instances share limits.

mod bucket;
mod limiter;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod store;

pub use bucket::TokenBucket;
pub use limiter::{AdmissionDecision, AdmissionRequest, AdmissionScope, FailurePolicy, RateLimiter};
pub use memory::MemoryRateStore;
#[cfg(feature = "postgres")]
pub use postgres::PgRateStore;
pub use store::RateStore;
