//! Upload sessions held for the retention window

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ledgerlens_core::models::UploadSession;
use ledgerlens_infra::StoreError;

pub use memory::MemorySessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: UploadSession) -> Result<(), StoreError>;

    /// Expired sessions are reported as absent even before they are purged
    async fn get(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<UploadSession>, StoreError>;

    /// Returns whether a session was removed
    async fn remove(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
