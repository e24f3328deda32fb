use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An outstanding one-time code for an email. At most one exists per email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationChallenge {
    pub email: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationChallenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Proof that an email was verified, bound to that single email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailToken {
    pub email: String,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendCodeRequest {
    #[validate(length(min = 1, max = 320, message = "Email must be between 1 and 320 characters"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendCodeResponse {
    pub success: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1, max = 320, message = "Email must be between 1 and 320 characters"))]
    pub email: String,
    #[validate(length(min = 1, max = 16, message = "Code must be between 1 and 16 characters"))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
