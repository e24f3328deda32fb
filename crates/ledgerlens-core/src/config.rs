//! Configuration module
//!
//! Every option the intake service recognizes lives in [`IntakeConfig`], grouped by
//! concern. Values come from the environment (with `.env` support) and fall back to
//! documented defaults; `Default` yields the same defaults for tests.

use std::env;
use std::str::FromStr;

const MB: usize = 1024 * 1024;

const MAX_ROWS: usize = 500;
const MAX_CSV_SIZE_MB: usize = 10;
const MAX_PDF_SIZE_MB: usize = 20;
const MAX_IMAGE_SIZE_MB: usize = 10;
const MAX_ZIP_SIZE_MB: usize = 25;
const MAX_ZIP_ENTRIES: usize = 500;
const MAX_UNZIPPED_MB: usize = 50;
const RETENTION_HOURS: i64 = 24;
const IP_PER_HOUR: u32 = 20;
const EMAIL_PER_DAY: u32 = 3;
const GLOBAL_PER_MINUTE: u32 = 100;
const VERIFY_ATTEMPTS_PER_WINDOW: u32 = 5;
const VERIFY_ATTEMPT_WINDOW_MINUTES: u32 = 15;
const BAN_TTL_HOURS: i64 = 24;
const STORE_TIMEOUT_MS: u64 = 250;
const BUCKET_IDLE_SECS: u64 = 3600;
const CODE_TTL_MINUTES: i64 = 15;
const TOKEN_TTL_MINUTES: i64 = 24 * 60;
const MIN_TOKEN_TTL_MINUTES: i64 = 15;
const MAX_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const SWEEP_INTERVAL_SECS: u64 = 300;
const MIN_SECRET_LEN: usize = 32;
const MAX_HOURS: i64 = 24 * 366;
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEV_TOKEN_SECRET: &str = "ledgerlens-development-secret-do-not-deploy";

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    /// Number of reverse proxies in front of the service (for X-Forwarded-For)
    pub trusted_proxy_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            environment: "development".to_string(),
            trusted_proxy_count: 1,
        }
    }
}

/// Upload size and structure limits
#[derive(Clone, Debug)]
pub struct LimitsConfig {
    pub max_rows: usize,
    /// Ceiling shared by CSV, OFX and QFX uploads
    pub max_text_bytes: usize,
    pub max_pdf_bytes: usize,
    pub max_image_bytes: usize,
    pub max_zip_bytes: usize,
    pub max_zip_entries: usize,
    pub max_unzipped_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rows: MAX_ROWS,
            max_text_bytes: MAX_CSV_SIZE_MB * MB,
            max_pdf_bytes: MAX_PDF_SIZE_MB * MB,
            max_image_bytes: MAX_IMAGE_SIZE_MB * MB,
            max_zip_bytes: MAX_ZIP_SIZE_MB * MB,
            max_zip_entries: MAX_ZIP_ENTRIES,
            max_unzipped_bytes: (MAX_UNZIPPED_MB * MB) as u64,
        }
    }
}

/// Which store backs the rate limiter's buckets and ban list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateStoreBackend {
    Memory,
    Postgres,
}

impl FromStr for RateStoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(RateStoreBackend::Memory),
            "postgres" | "postgresql" => Ok(RateStoreBackend::Postgres),
            other => Err(anyhow::anyhow!("Unsupported RATE_STORE: {}", other)),
        }
    }
}

/// Admission control settings
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub ip_per_hour: u32,
    pub email_per_day: u32,
    pub global_per_minute: u32,
    pub verify_attempts_per_window: u32,
    pub verify_attempt_window_minutes: u32,
    pub ban_list_enabled: bool,
    pub ban_ttl_hours: i64,
    /// Ban the uploading IP when an archive trips a zip safety check
    pub ban_on_archive_abuse: bool,
    /// Treat rate-store failures on admission checks as "allowed"
    pub admission_fail_open: bool,
    pub store_timeout_ms: u64,
    pub bucket_idle_secs: u64,
    pub store_backend: RateStoreBackend,
    pub database_url: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_per_hour: IP_PER_HOUR,
            email_per_day: EMAIL_PER_DAY,
            global_per_minute: GLOBAL_PER_MINUTE,
            verify_attempts_per_window: VERIFY_ATTEMPTS_PER_WINDOW,
            verify_attempt_window_minutes: VERIFY_ATTEMPT_WINDOW_MINUTES,
            ban_list_enabled: true,
            ban_ttl_hours: BAN_TTL_HOURS,
            ban_on_archive_abuse: true,
            admission_fail_open: true,
            store_timeout_ms: STORE_TIMEOUT_MS,
            bucket_idle_secs: BUCKET_IDLE_SECS,
            store_backend: RateStoreBackend::Memory,
            database_url: None,
        }
    }
}

/// Email verification and export gate settings
#[derive(Clone, Debug)]
pub struct VerificationConfig {
    pub code_ttl_minutes: i64,
    /// Always within 15 minutes to 24 hours
    pub token_ttl_minutes: i64,
    pub token_secret: String,
    /// Deployment allows exporting without an email token
    pub allow_export_bypass: bool,
    pub upgrade_url: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: CODE_TTL_MINUTES,
            token_ttl_minutes: TOKEN_TTL_MINUTES,
            token_secret: DEV_TOKEN_SECRET.to_string(),
            allow_export_bypass: false,
            upgrade_url: "https://ledgerlens.app/pricing".to_string(),
        }
    }
}

/// Outbound email (verification codes)
#[derive(Clone, Debug, Default)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub tls: bool,
}

/// Upload retention and background sweeping
#[derive(Clone, Debug)]
pub struct RetentionConfig {
    pub retention_hours: i64,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_hours: RETENTION_HOURS,
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
        }
    }
}

/// Application configuration for the intake service.
#[derive(Clone, Debug, Default)]
pub struct IntakeConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,
    pub verification: VerificationConfig,
    pub smtp: SmtpConfig,
    pub retention: RetentionConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().to_lowercase().parse::<bool>().ok())
        .unwrap_or(default)
}

impl IntakeConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server = ServerConfig {
            port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            trusted_proxy_count: env_or("TRUSTED_PROXY_COUNT", 1),
        };

        let limits = LimitsConfig {
            max_rows: env_or("MAX_ROWS", MAX_ROWS),
            max_text_bytes: env_or("MAX_CSV_SIZE_MB", MAX_CSV_SIZE_MB) * MB,
            max_pdf_bytes: env_or("MAX_PDF_SIZE_MB", MAX_PDF_SIZE_MB) * MB,
            max_image_bytes: env_or("MAX_IMAGE_SIZE_MB", MAX_IMAGE_SIZE_MB) * MB,
            max_zip_bytes: env_or("MAX_ZIP_SIZE_MB", MAX_ZIP_SIZE_MB) * MB,
            max_zip_entries: env_or("MAX_ZIP_ENTRIES", MAX_ZIP_ENTRIES),
            max_unzipped_bytes: (env_or("MAX_UNZIPPED_MB", MAX_UNZIPPED_MB) * MB) as u64,
        };

        let store_backend = match env::var("RATE_STORE") {
            Ok(value) => value.parse::<RateStoreBackend>()?,
            Err(_) => RateStoreBackend::Memory,
        };

        let rate_limit = RateLimitConfig {
            ip_per_hour: env_or("IP_PER_HOUR", IP_PER_HOUR),
            email_per_day: env_or("EMAIL_PER_DAY", EMAIL_PER_DAY),
            global_per_minute: env_or("GLOBAL_PER_MINUTE", GLOBAL_PER_MINUTE),
            verify_attempts_per_window: env_or(
                "VERIFY_ATTEMPTS_PER_WINDOW",
                VERIFY_ATTEMPTS_PER_WINDOW,
            ),
            verify_attempt_window_minutes: env_or(
                "VERIFY_ATTEMPT_WINDOW_MINUTES",
                VERIFY_ATTEMPT_WINDOW_MINUTES,
            ),
            ban_list_enabled: env_bool("BAN_LIST_ENABLED", true),
            ban_ttl_hours: env_or("BAN_TTL_HOURS", BAN_TTL_HOURS),
            ban_on_archive_abuse: env_bool("BAN_ON_ARCHIVE_ABUSE", true),
            admission_fail_open: env_bool("ADMISSION_FAIL_OPEN", true),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", STORE_TIMEOUT_MS),
            bucket_idle_secs: env_or("BUCKET_IDLE_SECS", BUCKET_IDLE_SECS),
            store_backend,
            database_url: env::var("DATABASE_URL").ok(),
        };

        let is_production = is_production_env(&server.environment);
        let token_secret = match env::var("EMAIL_TOKEN_SECRET") {
            Ok(secret) => secret,
            Err(_) if is_production => {
                return Err(anyhow::anyhow!(
                    "EMAIL_TOKEN_SECRET must be set in production"
                ))
            }
            Err(_) => DEV_TOKEN_SECRET.to_string(),
        };

        let verification = VerificationConfig {
            code_ttl_minutes: env_or("CODE_TTL_MINUTES", CODE_TTL_MINUTES),
            token_ttl_minutes: env_or("TOKEN_TTL_MINUTES", TOKEN_TTL_MINUTES)
                .clamp(MIN_TOKEN_TTL_MINUTES, MAX_TOKEN_TTL_MINUTES),
            token_secret,
            allow_export_bypass: env_bool("ALLOW_EXPORT_BYPASS", false),
            upgrade_url: env::var("UPGRADE_URL")
                .unwrap_or_else(|_| VerificationConfig::default().upgrade_url),
        };

        let smtp = SmtpConfig {
            enabled: env_bool("EMAIL_ENABLED", false),
            host: env::var("SMTP_HOST").ok(),
            port: env::var("SMTP_PORT").ok().and_then(|p| p.parse().ok()),
            user: env::var("SMTP_USER").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            from: env::var("SMTP_FROM").ok(),
            tls: env_bool("SMTP_TLS", true),
        };

        let retention = RetentionConfig {
            retention_hours: env_or("RETENTION_HOURS", RETENTION_HOURS),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", SWEEP_INTERVAL_SECS),
        };

        let config = IntakeConfig {
            server,
            limits,
            rate_limit,
            verification,
            smtp,
            retention,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let limits = &self.limits;
        if limits.max_rows == 0 {
            return Err(anyhow::anyhow!("MAX_ROWS must be greater than 0"));
        }
        if limits.max_text_bytes == 0
            || limits.max_pdf_bytes == 0
            || limits.max_image_bytes == 0
            || limits.max_zip_bytes == 0
        {
            return Err(anyhow::anyhow!("Per-type file size limits must be greater than 0"));
        }
        if limits.max_zip_entries == 0 || limits.max_unzipped_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_ZIP_ENTRIES and MAX_UNZIPPED_MB must be greater than 0"
            ));
        }

        let rate = &self.rate_limit;
        if rate.ip_per_hour == 0 || rate.email_per_day == 0 || rate.global_per_minute == 0 {
            return Err(anyhow::anyhow!("Rate limits must be greater than 0"));
        }
        if rate.verify_attempts_per_window == 0 || rate.verify_attempt_window_minutes == 0 {
            return Err(anyhow::anyhow!(
                "Verification attempt limits must be greater than 0"
            ));
        }
        if rate.store_backend == RateStoreBackend::Postgres && rate.database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be set when RATE_STORE=postgres"
            ));
        }

        if !(1..=MAX_HOURS).contains(&rate.ban_ttl_hours) {
            return Err(anyhow::anyhow!("BAN_TTL_HOURS must be between 1 and {}", MAX_HOURS));
        }

        if !(1..=MAX_HOURS).contains(&self.retention.retention_hours) {
            return Err(anyhow::anyhow!(
                "RETENTION_HOURS must be between 1 and {}",
                MAX_HOURS
            ));
        }
        if !(1..=MAX_SWEEP_INTERVAL_SECS).contains(&self.retention.sweep_interval_secs) {
            return Err(anyhow::anyhow!(
                "SWEEP_INTERVAL_SECS must be between 1 and {}",
                MAX_SWEEP_INTERVAL_SECS
            ));
        }
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&self.verification.code_ttl_minutes) {
            return Err(anyhow::anyhow!(
                "CODE_TTL_MINUTES must be between 1 and {}",
                MAX_TOKEN_TTL_MINUTES
            ));
        }

        let secret = &self.verification.token_secret;
        if self.is_production() && (secret.len() < MIN_SECRET_LEN || secret == DEV_TOKEN_SECRET)
        {
            return Err(anyhow::anyhow!(
                "EMAIL_TOKEN_SECRET must be at least {} bytes and not the development default",
                MIN_SECRET_LEN
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.server.environment)
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}
