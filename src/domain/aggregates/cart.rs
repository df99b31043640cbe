//! Cart: the pre-order holding area and the requested lines it turns into

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::Quantity;
use crate::{OrderError, Result};

/// One line of an order request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct RequestedItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
    #[serde(default)]
    pub extra_ids: Vec<Uuid>,
    #[serde(default)]
    pub variation_ids: Vec<Uuid>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl RequestedItem {
    pub fn new(product_id: Uuid, quantity: u32) -> Self {
        Self { product_id, quantity, extra_ids: vec![], variation_ids: vec![], note: None }
    }

    pub fn with_extras(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self { self.extra_ids.extend(ids); self }
    pub fn with_variations(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self { self.variation_ids.extend(ids); self }

    pub fn quantity(&self) -> Result<Quantity> {
        Quantity::new(self.quantity).map_err(|e| OrderError::Validation(e.to_string()))
    }
}

/// Keyed holding area for lines a client has not ordered yet.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn items(&self, key: &str) -> Result<Vec<RequestedItem>>;
    async fn put(&self, key: &str, items: Vec<RequestedItem>) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryCartStore {
    carts: Arc<RwLock<HashMap<String, Vec<RequestedItem>>>>,
}

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn items(&self, key: &str) -> Result<Vec<RequestedItem>> {
        Ok(self.carts.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn put(&self, key: &str, items: Vec<RequestedItem>) -> Result<()> {
        self.carts.write().await.insert(key.to_string(), items);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.carts.write().await.remove(key);
        Ok(())
    }
}
