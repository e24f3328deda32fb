//! Shared HTTP constants

/// Prefix for every versioned route
pub const API_PREFIX: &str = "/api/v1";

/// Header carrying the uploader's remaining IP allowance
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying a verified email token on export
pub const EMAIL_TOKEN_HEADER: &str = "x-email-token";

/// Slack on top of the largest file for multipart framing and text fields
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Server-wide cap on in-flight requests
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
