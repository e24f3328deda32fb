//! Error types module
//!
//! All intake failures are unified under the `AppError` enum. Each variant carries a
//! stable machine-readable code that clients branch on; the HTTP layer turns the
//! metadata exposed through [`ErrorMetadata`] into a response.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for abuse signals and rate limiting
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "RATE_LIMIT_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Remediation hint for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Rate limit exceeded for {scope}; retry after {retry_after_secs}s")]
    RateLimitExceeded { scope: String, retry_after_secs: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Malformed file: {0}")]
    MalformedFile(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("Archive safety violation: {0}")]
    ZipSafetyViolation(String),

    #[error("Archive contains unsupported content: {0}")]
    ZipUnsupportedMime(String),

    #[error("Verification code expired")]
    CodeExpired,

    #[error("Verification code invalid")]
    CodeInvalid,

    #[error("Email token invalid")]
    TokenInvalid,

    #[error("Email token expired")]
    TokenExpired,

    #[error("Email not verified: {0}")]
    EmailNotVerified(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::RateLimitExceeded { .. } => (
            429,
            "RATE_LIMIT_EXCEEDED",
            true,
            Some("Wait for the Retry-After interval and try again"),
            false,
            LogLevel::Warn,
        ),
        AppError::UnsupportedType(_) => (
            415,
            "UNSUPPORTED_TYPE",
            false,
            Some("Upload a CSV, OFX, QFX, PDF, JPG, PNG or ZIP file"),
            false,
            LogLevel::Debug,
        ),
        AppError::MalformedFile(_) => (
            422,
            "MALFORMED_FILE",
            false,
            Some("Re-export the statement from your bank and upload it unmodified"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge(_) => (
            413,
            "FILE_TOO_LARGE",
            false,
            Some("Split the statement into smaller files under the size limit"),
            false,
            LogLevel::Debug,
        ),
        AppError::ZipSafetyViolation(_) => (
            422,
            "ZIP_SAFETY_VIOLATION",
            false,
            Some("Upload a flat archive of statement files without nested archives"),
            false,
            LogLevel::Warn,
        ),
        AppError::ZipUnsupportedMime(_) => (
            422,
            "ZIP_UNSUPPORTED_MIME",
            false,
            Some("Remove files other than statements from the archive"),
            false,
            LogLevel::Debug,
        ),
        AppError::CodeExpired => (
            400,
            "CODE_EXPIRED",
            false,
            Some("Request a new verification code"),
            false,
            LogLevel::Debug,
        ),
        AppError::CodeInvalid => (
            400,
            "CODE_INVALID",
            false,
            Some("Check the code in your email and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::TokenInvalid => (
            401,
            "TOKEN_INVALID",
            false,
            Some("Verify your email again to obtain a new token"),
            false,
            LogLevel::Debug,
        ),
        AppError::TokenExpired => (
            401,
            "TOKEN_EXPIRED",
            false,
            Some("Verify your email again to obtain a new token"),
            false,
            LogLevel::Debug,
        ),
        AppError::EmailNotVerified(_) => (
            403,
            "EMAIL_NOT_VERIFIED",
            false,
            Some("Verify the email associated with this upload before exporting"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("The upload may have expired; upload the file again"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "GENERIC_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::RateLimitExceeded { .. } => "RateLimitExceeded",
            AppError::UnsupportedType(_) => "UnsupportedType",
            AppError::MalformedFile(_) => "MalformedFile",
            AppError::FileTooLarge(_) => "FileTooLarge",
            AppError::ZipSafetyViolation(_) => "ZipSafetyViolation",
            AppError::ZipUnsupportedMime(_) => "ZipUnsupportedMime",
            AppError::CodeExpired => "CodeExpired",
            AppError::CodeInvalid => "CodeInvalid",
            AppError::TokenInvalid => "TokenInvalid",
            AppError::TokenExpired => "TokenExpired",
            AppError::EmailNotVerified(_) => "EmailNotVerified",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Seconds the client should wait before retrying, for rate-limit denials
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::RateLimitExceeded {
                retry_after_secs, ..
            } => Some((*retry_after_secs).max(1)),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::RateLimitExceeded {
                retry_after_secs, ..
            } => format!(
                "Too many requests. Try again in {} seconds",
                (*retry_after_secs).max(1)
            ),
            AppError::UnsupportedType(ref msg) => msg.clone(),
            AppError::MalformedFile(ref msg) => msg.clone(),
            AppError::FileTooLarge(ref msg) => msg.clone(),
            AppError::ZipSafetyViolation(ref msg) => msg.clone(),
            AppError::ZipUnsupportedMime(ref msg) => msg.clone(),
            AppError::CodeExpired => "Verification code has expired".to_string(),
            AppError::CodeInvalid => "Verification code is invalid".to_string(),
            AppError::TokenInvalid => "Email token is invalid".to_string(),
            AppError::TokenExpired => "Email token has expired".to_string(),
            AppError::EmailNotVerified(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Something went wrong".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_rate_limit() {
        let err = AppError::RateLimitExceeded {
            scope: "ip".to_string(),
            retry_after_secs: 0,
        };
        assert_eq!(err.http_status_code(), 429);
        assert_eq!(err.error_code(), "RATE_LIMIT_EXCEEDED");
        assert!(err.is_recoverable());
        assert_eq!(err.retry_after_secs(), Some(1));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_file_codes() {
        let cases = [
            (AppError::UnsupportedType("exe".into()), 415, "UNSUPPORTED_TYPE"),
            (AppError::MalformedFile("x".into()), 422, "MALFORMED_FILE"),
            (AppError::FileTooLarge("x".into()), 413, "FILE_TOO_LARGE"),
            (AppError::ZipSafetyViolation("x".into()), 422, "ZIP_SAFETY_VIOLATION"),
            (AppError::ZipUnsupportedMime("x".into()), 422, "ZIP_UNSUPPORTED_MIME"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.http_status_code(), status);
            assert_eq!(err.error_code(), code);
            assert!(err.suggested_action().is_some());
            assert!(err.retry_after_secs().is_none());
        }
    }

    #[test]
    fn test_error_metadata_gate_codes() {
        assert_eq!(AppError::CodeExpired.http_status_code(), 400);
        assert_eq!(AppError::CodeInvalid.error_code(), "CODE_INVALID");
        assert_eq!(AppError::TokenInvalid.http_status_code(), 401);
        assert_eq!(AppError::TokenExpired.error_code(), "TOKEN_EXPIRED");
        let err = AppError::EmailNotVerified("bypass not allowed".into());
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "EMAIL_NOT_VERIFIED");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::Internal("connection refused to 10.0.0.3".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "GENERIC_ERROR");
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_chain() {
        let err: AppError = anyhow::anyhow!("store offline").into();
        assert_eq!(err.error_code(), "GENERIC_ERROR");
        assert!(err.detailed_message().contains("store offline"));
    }
}
