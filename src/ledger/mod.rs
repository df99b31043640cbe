//! Order Ledger: durable storage for orders and their lines.
//!
//! Every write goes through a [`LedgerTx`]. Dropping a transaction without
//! calling [`LedgerTx::commit`] discards everything written through it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{CatalogProduct, Order, OrderItem, OrderItemExtra, OrderItemVariation, OrderStatus};
use crate::domain::value_objects::Money;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCatalog, MemoryLedger};
pub use postgres::{PgCartStore, PgCatalog, PgOrderLedger};

/// A status write, applied only if the order still holds `expected`.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusChange {
    pub order_id: Uuid,
    pub expected: OrderStatus,
    pub next: OrderStatus,
    pub note: Option<String>,
    /// Recorded only when the order has no courier yet.
    pub delivery_agent_id: Option<Uuid>,
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Inserts a pending order with zeroed amounts.
    async fn create_order(&mut self, user_id: Uuid) -> Result<Order>;
    async fn create_order_item(&mut self, item: OrderItem) -> Result<OrderItem>;
    async fn create_extra(&mut self, extra: &OrderItemExtra) -> Result<()>;
    async fn create_variation(&mut self, variation: &OrderItemVariation) -> Result<()>;
    /// Stores subtotal and shipping and sets `total = subtotal + shipping`.
    async fn update_totals(&mut self, order_id: Uuid, subtotal: Money, shipping: Money) -> Result<()>;
    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>>;
    /// Fails with `TransitionConflict` when the stored status is no longer `expected`.
    /// A `None` note leaves the stored note untouched.
    async fn update_status(&mut self, change: &StatusChange) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product_with_extras_and_variations(&self, id: Uuid) -> Result<Option<CatalogProduct>>;
}
