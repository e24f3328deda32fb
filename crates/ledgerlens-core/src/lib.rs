//! LedgerLens Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and email
//! identity helpers shared by every LedgerLens intake component.

pub mod config;
pub mod email;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{
    IntakeConfig, LimitsConfig, RateLimitConfig, RateStoreBackend, RetentionConfig, ServerConfig,
    SmtpConfig, VerificationConfig,
};
pub use email::{hash_email, normalize_email};
pub use error::{AppError, ErrorMetadata, LogLevel};
