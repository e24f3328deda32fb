use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use ledgerlens_core::models::VerificationChallenge;
use ledgerlens_infra::StoreError;

/// Result of presenting a code against the stored challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// No challenge outstanding for the email
    Missing,
    /// The challenge had expired and has been removed
    Expired,
    /// Wrong code; the challenge stays for another attempt
    Mismatch,
    /// Correct code; the challenge has been consumed
    Accepted(VerificationChallenge),
}

/// Constant-time comparison of a submitted code with the issued one
pub fn code_matches(submitted: &str, expected: &str) -> bool {
    submitted.len() == expected.len() && bool::from(submitted.as_bytes().ct_eq(expected.as_bytes()))
}

/// Storage for outstanding verification challenges, keyed by normalized email.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store a challenge, replacing any prior one for the same email
    async fn put(&self, challenge: VerificationChallenge) -> Result<(), StoreError>;

    async fn get(&self, email: &str) -> Result<Option<VerificationChallenge>, StoreError>;

    /// Check `code` and consume the challenge on a match, as one atomic step.
    /// Two concurrent correct submissions redeem it exactly once.
    async fn redeem(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption, StoreError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Clone, Default)]
pub struct MemoryCodeStore {
    challenges: Arc<RwLock<HashMap<String, VerificationChallenge>>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn put(&self, challenge: VerificationChallenge) -> Result<(), StoreError> {
        let mut challenges = self.challenges.write().await;
        challenges.insert(challenge.email.clone(), challenge);
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<VerificationChallenge>, StoreError> {
        Ok(self.challenges.read().await.get(email).cloned())
    }

    async fn redeem(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption, StoreError> {
        let mut challenges = self.challenges.write().await;
        let Some(challenge) = challenges.get(email) else {
            return Ok(Redemption::Missing);
        };

        if challenge.is_expired_at(now) {
            challenges.remove(email);
            return Ok(Redemption::Expired);
        }
        if !code_matches(code, &challenge.code) {
            return Ok(Redemption::Mismatch);
        }
        Ok(challenges
            .remove(email)
            .map(Redemption::Accepted)
            .unwrap_or(Redemption::Missing))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut challenges = self.challenges.write().await;
        let before = challenges.len();
        challenges.retain(|_, challenge| !challenge.is_expired_at(now));
        Ok(before - challenges.len())
    }
}
