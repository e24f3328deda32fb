use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::Rng;

use ledgerlens_core::models::{EmailToken, VerificationChallenge};
use ledgerlens_core::{hash_email, normalize_email, AppError, VerificationConfig};
use ledgerlens_infra::{with_store_timeout, RateLimiter};

use super::store::{CodeStore, Redemption};
use super::token::TokenSigner;

/// A freshly minted email token and when it stops being accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks one-time email codes, and mints the tokens that gate export.
///
/// Per email the flow is: no challenge, code issued, then either verified
/// (challenge consumed, token minted) or expired. A new code always replaces
/// the previous one.
#[derive(Clone)]
pub struct VerificationGate {
    store: Arc<dyn CodeStore>,
    limiter: RateLimiter,
    signer: TokenSigner,
    code_ttl: Duration,
    token_ttl: Duration,
    store_timeout: StdDuration,
}

fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", n)
}

impl VerificationGate {
    pub fn new(
        store: Arc<dyn CodeStore>,
        limiter: RateLimiter,
        config: &VerificationConfig,
        store_timeout: StdDuration,
    ) -> Self {
        Self {
            store,
            limiter,
            signer: TokenSigner::new(&config.token_secret),
            code_ttl: Duration::minutes(config.code_ttl_minutes),
            token_ttl: Duration::minutes(config.token_ttl_minutes),
            store_timeout,
        }
    }

    /// Create a challenge for `email`, replacing any outstanding one.
    #[tracing::instrument(skip(self, email))]
    pub async fn issue(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationChallenge, AppError> {
        let email = normalize_email(email)?;
        let challenge = VerificationChallenge {
            code: generate_code(),
            issued_at: now,
            expires_at: now + self.code_ttl,
            email,
        };

        with_store_timeout(self.store_timeout, self.store.put(challenge.clone())).await?;
        tracing::info!(
            email_hash = %hash_email(&challenge.email),
            expires_at = %challenge.expires_at,
            "Verification code issued"
        );
        Ok(challenge)
    }

    /// Check a submitted code. Success consumes the challenge and returns a signed token.
    #[tracing::instrument(skip(self, email, code))]
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let email = normalize_email(email)?;
        let email_hash = hash_email(&email);

        let attempt = self.limiter.check_verify_attempt(&email_hash, now).await?;
        if !attempt.allowed {
            return Err(AppError::RateLimitExceeded {
                scope: "verify_attempt".to_string(),
                retry_after_secs: attempt.retry_after_secs(now),
            });
        }

        let redemption = with_store_timeout(
            self.store_timeout,
            self.store.redeem(&email, code.trim(), now),
        )
        .await?;
        match redemption {
            Redemption::Accepted(_) => {}
            Redemption::Missing => return Err(AppError::CodeInvalid),
            Redemption::Mismatch => {
                tracing::info!(email_hash = %email_hash, "Verification code mismatch");
                return Err(AppError::CodeInvalid);
            }
            Redemption::Expired => {
                tracing::info!(email_hash = %email_hash, "Verification code expired");
                return Err(AppError::CodeExpired);
            }
        }

        // Tokens carry whole seconds; report the expiry the token actually has
        let verified_at = now.trunc_subsecs(0);
        let token = EmailToken {
            email,
            verified_at,
            expires_at: verified_at + self.token_ttl,
        };
        let signed = self.signer.sign(&token)?;
        tracing::info!(email_hash = %email_hash, expires_at = %token.expires_at, "Email verified");

        Ok(IssuedToken {
            token: signed,
            expires_at: token.expires_at,
        })
    }

    /// Validate a token, optionally requiring it to be bound to `required_email`.
    pub fn check_token(
        &self,
        token: &str,
        required_email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EmailToken, AppError> {
        let verified = self.signer.verify(token, now)?;
        if let Some(required) = required_email {
            let required = normalize_email(required)?;
            if verified.email != required {
                return Err(AppError::EmailNotVerified(
                    "Token was issued for a different email".to_string(),
                ));
            }
        }
        Ok(verified)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        Ok(with_store_timeout(self.store_timeout, self.store.purge_expired(now)).await?)
    }
}
