//! In-memory ledger and catalog.
//!
//! Writes made through a transaction are staged on private copies of the
//! touched orders and only become visible when the transaction commits.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Catalog, LedgerTx, OrderLedger, StatusChange};
use crate::domain::aggregates::{CatalogProduct, Order, OrderItem, OrderItemExtra, OrderItemVariation, OrderStatus};
use crate::domain::value_objects::Money;
use crate::{OrderError, Result};

type Orders = Arc<RwLock<HashMap<Uuid, Order>>>;

#[derive(Clone, Default)]
pub struct MemoryLedger {
    orders: Orders,
}

impl MemoryLedger {
    pub fn new() -> Self { Self::default() }

    pub async fn order_count(&self) -> usize { self.orders.read().await.len() }

    pub async fn item_count(&self) -> usize {
        self.orders.read().await.values().map(|o| o.items.len()).sum()
    }

    /// Seeds a committed order, bypassing the creation pipeline.
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }
}

#[async_trait]
impl OrderLedger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryTx { orders: self.orders.clone(), staged: HashMap::new(), guards: vec![] }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }
}

struct MemoryTx {
    orders: Orders,
    staged: HashMap<Uuid, Order>,
    guards: Vec<(Uuid, OrderStatus)>,
}

impl MemoryTx {
    async fn staged_order(&mut self, id: Uuid) -> Result<&mut Order> {
        if !self.staged.contains_key(&id) {
            let committed = self.orders.read().await.get(&id).cloned().ok_or(OrderError::OrderNotFound(id))?;
            self.staged.insert(id, committed);
        }
        self.staged.get_mut(&id).ok_or(OrderError::OrderNotFound(id))
    }

    fn staged_item(&mut self, item_id: Uuid) -> Result<&mut OrderItem> {
        self.staged
            .values_mut()
            .flat_map(|o| o.items.iter_mut())
            .find(|i| i.id == item_id)
            .ok_or_else(|| OrderError::StorageError(format!("order item {item_id} does not exist")))
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn create_order(&mut self, user_id: Uuid) -> Result<Order> {
        let order = Order::placeholder(user_id);
        self.staged.insert(order.id, order.clone());
        Ok(order)
    }

    async fn create_order_item(&mut self, item: OrderItem) -> Result<OrderItem> {
        let order = self.staged_order(item.order_id).await?;
        order.items.push(item.clone());
        Ok(item)
    }

    async fn create_extra(&mut self, extra: &OrderItemExtra) -> Result<()> {
        self.staged_item(extra.order_item_id)?.extras.push(extra.clone());
        Ok(())
    }

    async fn create_variation(&mut self, variation: &OrderItemVariation) -> Result<()> {
        self.staged_item(variation.order_item_id)?.variations.push(variation.clone());
        Ok(())
    }

    async fn update_totals(&mut self, order_id: Uuid, subtotal: Money, shipping: Money) -> Result<()> {
        self.staged_order(order_id).await?.apply_totals(subtotal, shipping);
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        if let Some(order) = self.staged.get(&id) { return Ok(Some(order.clone())); }
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_status(&mut self, change: &StatusChange) -> Result<()> {
        let order = self.staged_order(change.order_id).await?;
        if order.status != change.expected {
            return Err(OrderError::TransitionConflict(change.order_id));
        }
        order.status = change.next;
        if change.note.is_some() {
            order.note = change.note.clone();
        }
        if order.delivery_agent_id.is_none() {
            order.delivery_agent_id = change.delivery_agent_id;
        }
        order.updated_at = Utc::now();
        self.guards.push((change.order_id, change.expected));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { orders, staged, guards } = *self;
        let mut orders = orders.write().await;
        for (id, expected) in guards {
            if orders.get(&id).map(|o| o.status) != Some(expected) {
                return Err(OrderError::TransitionConflict(id));
            }
        }
        orders.extend(staged);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<RwLock<HashMap<Uuid, CatalogProduct>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub async fn insert(&self, product: CatalogProduct) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn set_price(&self, id: Uuid, price: Money) {
        if let Some(p) = self.products.write().await.get_mut(&id) { p.base_price = price; }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_product_with_extras_and_variations(&self, id: Uuid) -> Result<Option<CatalogProduct>> {
        Ok(self.products.read().await.get(&id).cloned())
    }
}
