use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use ledgerlens_core::models::UploadSession;
use ledgerlens_infra::StoreError;

use super::SessionStore;

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, UploadSession>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: UploadSession) -> Result<(), StoreError> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<UploadSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&id)
            .filter(|session| !session.is_expired_at(now))
            .cloned())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before - sessions.len())
    }
}
