use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use ledgerlens_core::models::{BanEntry, BanScope, RateDecision, RatePolicy};
use ledgerlens_core::{AppError, RateLimitConfig};

use super::store::RateStore;
use crate::error::StoreError;
use crate::timeout::with_store_timeout;

/// What to do when the store cannot answer an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Treat the check as passed and log a degraded-mode warning
    FailOpen,
    /// Deny the request
    FailClosed,
}

/// Which check produced an admission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionScope {
    Ban,
    Global,
    Ip,
    Email,
    VerifyAttempt,
}

impl AdmissionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionScope::Ban => "ban",
            AdmissionScope::Global => "global",
            AdmissionScope::Ip => "ip",
            AdmissionScope::Email => "email",
            AdmissionScope::VerifyAttempt => "verify_attempt",
        }
    }
}

impl fmt::Display for AdmissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking to be admitted
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest<'a> {
    pub ip: &'a str,
    /// SHA-256 hex of the normalized email, when one was supplied
    pub email_hash: Option<&'a str>,
}

/// Combined result of the ban, global, IP and email checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub denied_by: Option<AdmissionScope>,
    /// Tokens left in the caller's IP bucket
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// A store call failed and the failure policy decided the outcome
    pub degraded: bool,
}

impl AdmissionDecision {
    /// Turn a denial into `RATE_LIMIT_EXCEEDED`.
    pub fn ensure_allowed(self, now: DateTime<Utc>) -> Result<Self, AppError> {
        if self.allowed {
            return Ok(self);
        }
        let decision = RateDecision {
            allowed: false,
            remaining: 0,
            reset_at: self.reset_at,
        };
        Err(AppError::RateLimitExceeded {
            scope: self
                .denied_by
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            retry_after_secs: decision.retry_after_secs(now),
        })
    }
}

/// Outcome of one bucket check after the failure policy has been applied
enum Checked {
    Decision(RateDecision),
    Degraded { allowed: bool },
}

/// Token-bucket admission control over a pluggable [`RateStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    global: RatePolicy,
    per_ip: RatePolicy,
    per_email: RatePolicy,
    verify_attempts: RatePolicy,
    ban_list_enabled: bool,
    ban_ttl: Duration,
    bucket_idle: Duration,
    store_timeout: StdDuration,
    failure_policy: FailurePolicy,
}

impl RateLimiter {
    pub fn from_config(store: Arc<dyn RateStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            global: RatePolicy::per_minute(config.global_per_minute),
            per_ip: RatePolicy::per_hour(config.ip_per_hour),
            per_email: RatePolicy::per_day(config.email_per_day),
            verify_attempts: RatePolicy::per_window(
                config.verify_attempts_per_window,
                Duration::minutes(config.verify_attempt_window_minutes as i64),
            ),
            ban_list_enabled: config.ban_list_enabled,
            ban_ttl: Duration::hours(config.ban_ttl_hours),
            bucket_idle: Duration::seconds(config.bucket_idle_secs as i64),
            store_timeout: StdDuration::from_millis(config.store_timeout_ms),
            failure_policy: if config.admission_fail_open {
                FailurePolicy::FailOpen
            } else {
                FailurePolicy::FailClosed
            },
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Raw bucket check for an arbitrary key. Store errors propagate.
    #[tracing::instrument(skip(self, policy))]
    pub async fn check(
        &self,
        key: &str,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, StoreError> {
        with_store_timeout(self.store_timeout, self.store.check(key, policy, now)).await
    }

    /// Ban list, then global, IP and email buckets. First denial wins.
    #[tracing::instrument(skip(self, request), fields(ip = %request.ip, has_email = request.email_hash.is_some()))]
    pub async fn check_admission(
        &self,
        request: AdmissionRequest<'_>,
        now: DateTime<Utc>,
    ) -> AdmissionDecision {
        let mut degraded = false;

        if self.ban_list_enabled {
            let mut subjects = vec![(BanScope::Ip, request.ip)];
            if let Some(hash) = request.email_hash {
                subjects.push((BanScope::Email, hash));
            }
            for (scope, subject) in subjects {
                let lookup = with_store_timeout(
                    self.store_timeout,
                    self.store.active_ban(scope, subject, now),
                )
                .await;
                match lookup {
                    Ok(Some(ban)) => {
                        tracing::warn!(
                            scope = %scope,
                            reason = %ban.reason,
                            expires_at = %ban.expires_at,
                            "Request denied by ban list"
                        );
                        return AdmissionDecision {
                            allowed: false,
                            denied_by: Some(AdmissionScope::Ban),
                            remaining: 0,
                            reset_at: ban.expires_at,
                            degraded,
                        };
                    }
                    Ok(None) => {}
                    Err(err) => {
                        degraded = true;
                        if let Some(denial) = self.on_store_failure(AdmissionScope::Ban, &err, now)
                        {
                            return denial;
                        }
                    }
                }
            }
        }

        let mut checks = vec![
            (AdmissionScope::Global, "global".to_string(), self.global),
            (AdmissionScope::Ip, format!("ip:{}", request.ip), self.per_ip),
        ];
        if let Some(hash) = request.email_hash {
            checks.push((AdmissionScope::Email, format!("email:{}", hash), self.per_email));
        }

        let mut remaining = self.per_ip.capacity;
        let mut reset_at = now;
        for (scope, key, policy) in checks {
            match self.checked(scope, &key, policy, now).await {
                Checked::Decision(decision) if !decision.allowed => {
                    tracing::info!(scope = %scope, "Admission denied by rate limit");
                    return AdmissionDecision {
                        allowed: false,
                        denied_by: Some(scope),
                        remaining: 0,
                        reset_at: decision.reset_at,
                        degraded,
                    };
                }
                Checked::Decision(decision) => {
                    if scope == AdmissionScope::Ip {
                        remaining = decision.remaining;
                        reset_at = decision.reset_at;
                    }
                }
                Checked::Degraded { allowed: true } => degraded = true,
                Checked::Degraded { allowed: false } => {
                    return AdmissionDecision {
                        allowed: false,
                        denied_by: Some(scope),
                        remaining: 0,
                        reset_at: now + Duration::seconds(1),
                        degraded: true,
                    };
                }
            }
        }

        AdmissionDecision {
            allowed: true,
            denied_by: None,
            remaining,
            reset_at,
            degraded,
        }
    }

    /// Consume one verification attempt for a hashed email.
    ///
    /// This guards the code check, so store failures are returned as errors
    /// instead of being resolved by the admission failure policy.
    #[tracing::instrument(skip(self, email_hash))]
    pub async fn check_verify_attempt(
        &self,
        email_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, AppError> {
        let key = format!("verify:{}", email_hash);
        let decision = self.check(&key, self.verify_attempts, now).await?;
        if !decision.allowed {
            tracing::warn!(email_hash = %email_hash, "Verification attempts exhausted");
        }
        Ok(decision)
    }

    pub async fn ban_ip(&self, ip: &str, reason: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.ban(BanScope::Ip, ip, reason, self.ban_ttl, now).await
    }

    pub async fn ban_email(
        &self,
        email_hash: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.ban(BanScope::Email, email_hash, reason, self.ban_ttl, now)
            .await
    }

    /// Write a ban with an explicit TTL
    #[tracing::instrument(skip(self))]
    pub async fn ban(
        &self,
        scope: BanScope,
        subject: &str,
        reason: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let entry = BanEntry {
            scope,
            subject: subject.to_string(),
            reason: reason.to_string(),
            expires_at: now + ttl.max(Duration::seconds(1)),
        };
        with_store_timeout(self.store_timeout, self.store.ban(entry)).await?;
        tracing::warn!(scope = %scope, reason = %reason, ttl_secs = ttl.num_seconds(), "Ban recorded");
        Ok(())
    }

    pub async fn unban(&self, scope: BanScope, subject: &str) -> Result<bool, StoreError> {
        let lifted =
            with_store_timeout(self.store_timeout, self.store.lift_ban(scope, subject)).await?;
        if lifted {
            tracing::info!(scope = %scope, "Ban lifted");
        }
        Ok(lifted)
    }

    /// Evict idle buckets and expired bans. Returns `(buckets, bans)` removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<(usize, usize), StoreError> {
        let buckets = with_store_timeout(
            self.store_timeout,
            self.store.evict_idle(now - self.bucket_idle),
        )
        .await?;
        let bans =
            with_store_timeout(self.store_timeout, self.store.purge_expired_bans(now)).await?;
        Ok((buckets, bans))
    }

    async fn checked(
        &self,
        scope: AdmissionScope,
        key: &str,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> Checked {
        match self.check(key, policy, now).await {
            Ok(decision) => Checked::Decision(decision),
            Err(err) => Checked::Degraded {
                allowed: self.on_store_failure(scope, &err, now).is_none(),
            },
        }
    }

    /// Apply the failure policy. `Some` is the denial to return.
    fn on_store_failure(
        &self,
        scope: AdmissionScope,
        err: &StoreError,
        now: DateTime<Utc>,
    ) -> Option<AdmissionDecision> {
        match self.failure_policy {
            FailurePolicy::FailOpen => {
                tracing::warn!(
                    degraded_mode = true,
                    scope = %scope,
                    backend = self.store.backend(),
                    error = %err,
                    "Rate store unavailable, admitting request"
                );
                None
            }
            FailurePolicy::FailClosed => {
                tracing::error!(
                    degraded_mode = true,
                    scope = %scope,
                    backend = self.store.backend(),
                    error = %err,
                    "Rate store unavailable, denying request"
                );
                Some(AdmissionDecision {
                    allowed: false,
                    denied_by: Some(scope),
                    remaining: 0,
                    reset_at: now + Duration::seconds(1),
                    degraded: true,
                })
            }
        }
    }
}
