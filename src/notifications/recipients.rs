//! Device token lookup for notification recipients.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::NotificationError;

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn user_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<String>, NotificationError>;
    async fn business_owner_tokens(&self, business_ids: &[Uuid]) -> Result<Vec<String>, NotificationError>;
    async fn available_courier_tokens(&self) -> Result<Vec<String>, NotificationError>;
}

#[derive(Clone)]
pub struct PgRecipientDirectory { pool: PgPool }

impl PgRecipientDirectory {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn tokens(&self, sql: &str, ids: &[Uuid]) -> Result<Vec<String>, NotificationError> {
        let rows: Vec<(String,)> = sqlx::query_as(sql).bind(ids).fetch_all(&self.pool).await
            .map_err(|e| NotificationError::Recipients(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[async_trait]
impl RecipientDirectory for PgRecipientDirectory {
    async fn user_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<String>, NotificationError> {
        self.tokens("SELECT token FROM device_tokens WHERE user_id = ANY($1)", user_ids).await
    }

    async fn business_owner_tokens(&self, business_ids: &[Uuid]) -> Result<Vec<String>, NotificationError> {
        self.tokens("SELECT d.token FROM device_tokens d JOIN businesses b ON b.owner_id = d.user_id WHERE b.id = ANY($1)", business_ids).await
    }

    async fn available_courier_tokens(&self) -> Result<Vec<String>, NotificationError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT d.token FROM device_tokens d JOIN delivery_agents a ON a.user_id = d.user_id WHERE a.is_available")
            .fetch_all(&self.pool).await
            .map_err(|e| NotificationError::Recipients(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[derive(Default)]
struct Directory {
    tokens: HashMap<Uuid, Vec<String>>,
    owners: HashMap<Uuid, Uuid>,
    available_couriers: HashSet<Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryRecipientDirectory { inner: Arc<RwLock<Directory>> }

impl MemoryRecipientDirectory {
    pub fn new() -> Self { Self::default() }

    pub async fn register_token(&self, user_id: Uuid, token: impl Into<String>) {
        self.inner.write().await.tokens.entry(user_id).or_default().push(token.into());
    }

    pub async fn set_owner(&self, business_id: Uuid, owner_id: Uuid) {
        self.inner.write().await.owners.insert(business_id, owner_id);
    }

    pub async fn set_courier_available(&self, user_id: Uuid, available: bool) {
        let mut dir = self.inner.write().await;
        if available { dir.available_couriers.insert(user_id); } else { dir.available_couriers.remove(&user_id); }
    }
}

#[async_trait]
impl RecipientDirectory for MemoryRecipientDirectory {
    async fn user_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<String>, NotificationError> {
        let dir = self.inner.read().await;
        Ok(user_ids.iter().filter_map(|id| dir.tokens.get(id)).flatten().cloned().collect())
    }

    async fn business_owner_tokens(&self, business_ids: &[Uuid]) -> Result<Vec<String>, NotificationError> {
        let owners: Vec<Uuid> = {
            let dir = self.inner.read().await;
            business_ids.iter().filter_map(|b| dir.owners.get(b).copied()).collect()
        };
        self.user_tokens(&owners).await
    }

    async fn available_courier_tokens(&self) -> Result<Vec<String>, NotificationError> {
        let couriers: Vec<Uuid> = self.inner.read().await.available_couriers.iter().copied().collect();
        self.user_tokens(&couriers).await
    }
}
