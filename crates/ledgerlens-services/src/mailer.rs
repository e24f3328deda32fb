//! Delivery of verification codes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use ledgerlens_core::{hash_email, AppError, SmtpConfig};

#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

fn code_body(code: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "Your LedgerLens verification code is {}.\n\n\
         It expires at {} UTC. If you did not request it, ignore this email.\n",
        code,
        expires_at.format("%H:%M")
    )
}

/// Sends codes through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Returns `None` if email is disabled or SMTP is not configured.
    pub fn from_config(config: &SmtpConfig) -> Option<Self> {
        if !config.enabled {
            tracing::debug!("Email delivery disabled (EMAIL_ENABLED=false)");
            return None;
        }
        let host = config.host.as_deref()?;
        let from: Mailbox = match config.from.as_deref()?.parse() {
            Ok(from) => from,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid SMTP_FROM, email delivery disabled");
                return None;
            }
        };
        let port = config.port.unwrap_or(587);
        let credentials = match (config.user.as_deref(), config.password.as_deref()) {
            (Some(u), Some(p)) => Some(Credentials::new(u.to_string(), p.to_string())),
            _ => None,
        };

        let mailer = if config.tls {
            let b = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port);
            let b = match credentials {
                Some(c) => b.credentials(c),
                None => b,
            };
            tracing::info!(host = %host, port = port, "Mailer initialized (SMTP with STARTTLS)");
            b.build()
        } else {
            let b = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
            let b = match credentials {
                Some(c) => b.credentials(c),
                None => b,
            };
            tracing::info!(host = %host, port = port, "Mailer initialized (SMTP)");
            b.build()
        };

        Some(Self {
            mailer: Arc::new(mailer),
            from,
        })
    }
}

#[async_trait]
impl CodeMailer for SmtpMailer {
    #[tracing::instrument(skip_all)]
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let to: Mailbox = email
            .parse()
            .map_err(|e| AppError::InvalidInput(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Your LedgerLens verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(code_body(code, expires_at))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.mailer.send(message).await.map_err(|e| AppError::InternalWithSource {
            message: "Failed to send verification email".to_string(),
            source: anyhow::Error::new(e),
        })?;
        tracing::info!(email_hash = %hash_email(email), "Verification email sent");
        Ok(())
    }
}

/// Used when SMTP is not configured: records the delivery in the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl CodeMailer for LogMailer {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        tracing::info!(
            email_hash = %hash_email(email),
            expires_at = %expires_at,
            "Verification code ready (email delivery disabled)"
        );
        tracing::debug!(code = %code, "Verification code");
        Ok(())
    }
}

/// SMTP when configured, otherwise the log mailer.
pub fn mailer_from_config(config: &SmtpConfig) -> Arc<dyn CodeMailer> {
    match SmtpMailer::from_config(config) {
        Some(smtp) => Arc::new(smtp),
        None => Arc::new(LogMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_has_no_smtp_mailer() {
        let config = SmtpConfig::default();
        assert!(SmtpMailer::from_config(&config).is_none());
    }

    #[test]
    fn test_enabled_without_host_has_no_smtp_mailer() {
        let config = SmtpConfig {
            enabled: true,
            from: Some("noreply@ledgerlens.app".to_string()),
            ..SmtpConfig::default()
        };
        assert!(SmtpMailer::from_config(&config).is_none());
    }

    #[test]
    fn test_body_mentions_code() {
        let body = code_body("042917", Utc::now());
        assert!(body.contains("042917"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_delivery() {
        LogMailer
            .send_code("alice@example.com", "123456", Utc::now())
            .await
            .unwrap();
    }
}
