use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use ledgerlens_core::models::{BanEntry, BanScope, RateDecision, RatePolicy};

use super::bucket::TokenBucket;
use super::store::RateStore;
use crate::error::StoreError;

const DEFAULT_SHARDS: usize = 16;
const DEFAULT_MAX_BUCKETS_PER_SHARD: usize = 10_000;

/// In-process rate store.
///
/// Buckets live in sharded maps so unrelated keys rarely contend on the same lock.
/// Each check holds its shard's lock across refill and decrement.
#[derive(Clone)]
pub struct MemoryRateStore {
    shards: Vec<Arc<Mutex<HashMap<String, TokenBucket>>>>,
    bans: Arc<RwLock<HashMap<(BanScope, String), BanEntry>>>,
    max_buckets_per_shard: usize,
}

impl Default for MemoryRateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a store with a custom shard count (a power of two distributes best)
    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            bans: Arc::new(RwLock::new(HashMap::new())),
            max_buckets_per_shard: DEFAULT_MAX_BUCKETS_PER_SHARD,
        }
    }

    pub fn with_max_buckets_per_shard(mut self, max: usize) -> Self {
        self.max_buckets_per_shard = max.max(1);
        self
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Number of live buckets across all shards
    pub async fn bucket_count(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn check(
        &self,
        key: &str,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, StoreError> {
        let shard = &self.shards[self.shard_index(key)];
        let mut buckets = shard.lock().await;

        // Make room before inserting a new key: the least recently seen bucket
        // goes first. Evicting a bucket is the same as it being full.
        if !buckets.contains_key(key) && buckets.len() >= self.max_buckets_per_shard {
            let oldest_key = buckets
                .iter()
                .min_by_key(|(_, bucket)| bucket.last_seen)
                .map(|(k, _)| k.clone());
            if let Some(key_to_remove) = oldest_key {
                buckets.remove(&key_to_remove);
                tracing::debug!("Evicted least recently used rate bucket to make room");
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(policy, now));
        Ok(bucket.check(policy, now))
    }

    async fn ban(&self, entry: BanEntry) -> Result<(), StoreError> {
        let mut bans = self.bans.write().await;
        bans.insert((entry.scope, entry.subject.clone()), entry);
        Ok(())
    }

    async fn active_ban(
        &self,
        scope: BanScope,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BanEntry>, StoreError> {
        let bans = self.bans.read().await;
        Ok(bans
            .get(&(scope, subject.to_string()))
            .filter(|entry| entry.is_active_at(now))
            .cloned())
    }

    async fn lift_ban(&self, scope: BanScope, subject: &str) -> Result<bool, StoreError> {
        let mut bans = self.bans.write().await;
        Ok(bans.remove(&(scope, subject.to_string())).is_some())
    }

    async fn evict_idle(&self, idle_before: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut evicted = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| !bucket.is_idle(idle_before));
            evicted += before - buckets.len();
        }
        Ok(evicted)
    }

    async fn purge_expired_bans(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut bans = self.bans.write().await;
        let before = bans.len();
        bans.retain(|_, entry| entry.is_active_at(now));
        Ok(before - bans.len())
    }
}
