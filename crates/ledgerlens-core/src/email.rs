//! Email identity helpers
//!
//! Emails are normalized before any keying (rate buckets, challenges, tokens) and
//! only ever logged or stored for rate limiting as a SHA-256 digest.

use sha2::{Digest, Sha256};
use validator::ValidateEmail;

use crate::error::AppError;

/// Trim and lower-case an email, rejecting anything that is not a syntactically
/// valid address.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AppError::InvalidInput("Email is required".to_string()));
    }
    if !normalized.validate_email() {
        return Err(AppError::InvalidInput("Email address is invalid".to_string()));
    }
    Ok(normalized)
}

/// Hex SHA-256 of an already-normalized email.
pub fn hash_email(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}
