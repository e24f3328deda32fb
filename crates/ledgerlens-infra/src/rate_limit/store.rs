use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ledgerlens_core::models::{BanEntry, BanScope, RateDecision, RatePolicy};

use crate::error::StoreError;

/// Backing store for token buckets and the ban list.
///
/// `check` must perform refill and decrement atomically per key; buckets are
/// never handed out to callers.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    async fn check(
        &self,
        key: &str,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, StoreError>;

    /// Insert or replace the ban for `(scope, subject)`
    async fn ban(&self, entry: BanEntry) -> Result<(), StoreError>;

    async fn active_ban(
        &self,
        scope: BanScope,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BanEntry>, StoreError>;

    /// Returns whether a ban was removed
    async fn lift_ban(&self, scope: BanScope, subject: &str) -> Result<bool, StoreError>;

    /// Drop buckets not checked since `idle_before`; returns how many went away
    async fn evict_idle(&self, idle_before: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn purge_expired_bans(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
