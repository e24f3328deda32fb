use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ledgerlens_core::models::{BanEntry, BanScope, RateDecision, RatePolicy};

use super::bucket::TokenBucket;
use super::store::RateStore;
use crate::error::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct BucketRow {
    tokens: i32,
    last_refill: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct BanRow {
    reason: String,
    expires_at: DateTime<Utc>,
}

/// Rate store shared across instances through Postgres.
///
/// A check runs in one transaction: the bucket row is created if missing, then
/// locked with `FOR UPDATE` while refill and decrement are applied.
#[derive(Clone)]
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(skip(self, policy), fields(capacity = policy.capacity))]
    async fn check(
        &self,
        key: &str,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO rate_buckets (key, tokens, last_refill, last_seen)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(policy.capacity as i32)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row: BucketRow = sqlx::query_as(
            r#"
            SELECT tokens, last_refill, last_seen
            FROM rate_buckets
            WHERE key = $1
            FOR UPDATE
            "#,
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        let mut bucket = TokenBucket {
            tokens: row.tokens.max(0) as u32,
            last_refill: row.last_refill,
            last_seen: row.last_seen,
        };
        let decision = bucket.check(policy, now);

        sqlx::query(
            r#"
            UPDATE rate_buckets
            SET tokens = $2, last_refill = $3, last_seen = $4
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(bucket.tokens as i32)
        .bind(bucket.last_refill)
        .bind(bucket.last_seen)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(decision)
    }

    async fn ban(&self, entry: BanEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ban_entries (scope, subject, reason, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (scope, subject)
            DO UPDATE SET reason = EXCLUDED.reason, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(entry.scope.as_str())
        .bind(&entry.subject)
        .bind(&entry.reason)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_ban(
        &self,
        scope: BanScope,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BanEntry>, StoreError> {
        let row: Option<BanRow> = sqlx::query_as(
            r#"
            SELECT reason, expires_at
            FROM ban_entries
            WHERE scope = $1 AND subject = $2 AND expires_at > $3
            "#,
        )
        .bind(scope.as_str())
        .bind(subject)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| BanEntry {
            scope,
            subject: subject.to_string(),
            reason: row.reason,
            expires_at: row.expires_at,
        }))
    }

    async fn lift_ban(&self, scope: BanScope, subject: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM ban_entries WHERE scope = $1 AND subject = $2")
            .bind(scope.as_str())
            .bind(subject)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn evict_idle(&self, idle_before: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM rate_buckets WHERE last_seen < $1")
            .bind(idle_before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn purge_expired_bans(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM ban_entries WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
