//! LedgerLens Infrastructure Library
//!
//! Shared infrastructure for the intake service:
//! - Rate limiting (token buckets over a pluggable store, ban list)
//! - Store errors and bounded store calls
//! - Telemetry initialization

pub mod error;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod timeout;

pub use error::StoreError;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{
    AdmissionRequest, AdmissionScope, FailurePolicy, MemoryRateStore, RateLimiter, RateStore,
};

#[cfg(feature = "postgres")]
pub use rate_limit::PgRateStore;

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

pub use timeout::with_store_timeout;
