//! Postgres ledger, catalog and cart store backed by sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Catalog, LedgerTx, OrderLedger, StatusChange};
use crate::domain::aggregates::{
    CartStore, CatalogProduct, Order, OrderItem, OrderItemExtra, OrderItemVariation, ProductExtra, ProductVariation,
    RequestedItem,
};
use crate::domain::value_objects::{Money, Quantity};
use crate::{OrderError, Result};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Uuid, delivery_agent_id: Option<Uuid>, status: String,
    subtotal: Decimal, shipping: Decimal, total: Decimal, note: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid, order_id: Uuid, product_id: Uuid, product_name: String, business_id: Uuid,
    unit_price: Decimal, quantity: i32, total_price: Decimal, note: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct SelectionRow { id: Uuid, order_item_id: Uuid, source_id: Uuid, name: String, price: Decimal }

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { id: Uuid, business_id: Uuid, name: String, price: Decimal, is_available: bool }

#[derive(Debug, sqlx::FromRow)]
struct OptionRow { id: Uuid, name: String, price: Decimal }

#[derive(Debug, sqlx::FromRow)]
struct CartRow { product_id: Uuid, quantity: i32, extra_ids: Vec<Uuid>, variation_ids: Vec<Uuid>, note: Option<String> }

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: self.id, user_id: self.user_id, delivery_agent_id: self.delivery_agent_id,
            status: self.status.parse().map_err(|e| OrderError::StorageError(format!("order {}: {e}", self.id)))?,
            subtotal: self.subtotal.into(), shipping: self.shipping.into(), total: self.total.into(),
            note: self.note, items, created_at: self.created_at, updated_at: self.updated_at,
        })
    }
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem> {
        let quantity = u32::try_from(self.quantity).ok().and_then(|q| Quantity::new(q).ok())
            .ok_or_else(|| OrderError::StorageError(format!("order item {} has quantity {}", self.id, self.quantity)))?;
        Ok(OrderItem {
            id: self.id, order_id: self.order_id, product_id: self.product_id, product_name: self.product_name,
            business_id: self.business_id, unit_price: self.unit_price.into(), quantity,
            total_price: self.total_price.into(), note: self.note, extras: vec![], variations: vec![],
        })
    }
}

const SELECT_ORDER: &str = "SELECT id, user_id, delivery_agent_id, status, subtotal, shipping, total, note, created_at, updated_at FROM orders WHERE id = $1";
// Held until commit so concurrent transitions on one order queue up.
const SELECT_ORDER_FOR_UPDATE: &str = "SELECT id, user_id, delivery_agent_id, status, subtotal, shipping, total, note, created_at, updated_at FROM orders WHERE id = $1 FOR UPDATE";

const SELECT_CART: &str = "SELECT product_id, quantity, extra_ids, variation_ids, note FROM cart_items WHERE session_id = $1 ORDER BY position";
const INSERT_CART_ITEM: &str = "INSERT INTO cart_items (id, session_id, position, product_id, quantity, extra_ids, variation_ids, note) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

async fn load_order(conn: &mut PgConnection, id: Uuid, lock: bool) -> Result<Option<Order>> {
    let sql = if lock { SELECT_ORDER_FOR_UPDATE } else { SELECT_ORDER };
    let Some(row) = sqlx::query_as::<_, OrderRow>(sql)
        .bind(id).fetch_optional(&mut *conn).await? else { return Ok(None) };

    let mut items = sqlx::query_as::<_, OrderItemRow>("SELECT id, order_id, product_id, product_name, business_id, unit_price, quantity, total_price, note FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(id).fetch_all(&mut *conn).await?
        .into_iter().map(OrderItemRow::into_item).collect::<Result<Vec<_>>>()?;
    let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();

    let extras = sqlx::query_as::<_, SelectionRow>("SELECT id, order_item_id, extra_id AS source_id, name, price FROM order_item_extras WHERE order_item_id = ANY($1) ORDER BY id")
        .bind(&item_ids).fetch_all(&mut *conn).await?;
    let variations = sqlx::query_as::<_, SelectionRow>("SELECT id, order_item_id, variation_id AS source_id, name, price FROM order_item_variations WHERE order_item_id = ANY($1) ORDER BY id")
        .bind(&item_ids).fetch_all(&mut *conn).await?;

    for item in &mut items {
        item.extras = extras.iter().filter(|e| e.order_item_id == item.id)
            .map(|e| OrderItemExtra { id: e.id, order_item_id: e.order_item_id, extra_id: e.source_id, name: e.name.clone(), price: e.price.into() })
            .collect();
        item.variations = variations.iter().filter(|v| v.order_item_id == item.id)
            .map(|v| OrderItemVariation { id: v.id, order_item_id: v.order_item_id, variation_id: v.source_id, name: v.name.clone(), price: v.price.into() })
            .collect();
    }
    row.into_order(items).map(Some)
}

#[derive(Clone)]
pub struct PgOrderLedger { pool: PgPool }

impl PgOrderLedger {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        Ok(Box::new(PgLedgerTx { tx: self.pool.begin().await? }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut *conn, id, false).await
    }
}

pub struct PgLedgerTx { tx: Transaction<'static, Postgres> }

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn create_order(&mut self, user_id: Uuid) -> Result<Order> {
        let order = Order::placeholder(user_id);
        sqlx::query("INSERT INTO orders (id, user_id, delivery_agent_id, status, subtotal, shipping, total, note, created_at, updated_at) VALUES ($1, $2, NULL, $3, 0, 0, 0, NULL, $4, $5)")
            .bind(order.id).bind(order.user_id).bind(order.status.as_str()).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *self.tx).await?;
        Ok(order)
    }

    async fn create_order_item(&mut self, item: OrderItem) -> Result<OrderItem> {
        let quantity = i32::try_from(item.quantity.value()).map_err(|_| OrderError::Validation("quantity out of range".into()))?;
        sqlx::query("INSERT INTO order_items (id, order_id, product_id, product_name, business_id, unit_price, quantity, total_price, note) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(item.id).bind(item.order_id).bind(item.product_id).bind(&item.product_name).bind(item.business_id)
            .bind(item.unit_price.amount()).bind(quantity).bind(item.total_price.amount()).bind(&item.note)
            .execute(&mut *self.tx).await?;
        Ok(item)
    }

    async fn create_extra(&mut self, extra: &OrderItemExtra) -> Result<()> {
        sqlx::query("INSERT INTO order_item_extras (id, order_item_id, extra_id, name, price) VALUES ($1, $2, $3, $4, $5)")
            .bind(extra.id).bind(extra.order_item_id).bind(extra.extra_id).bind(&extra.name).bind(extra.price.amount())
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn create_variation(&mut self, variation: &OrderItemVariation) -> Result<()> {
        sqlx::query("INSERT INTO order_item_variations (id, order_item_id, variation_id, name, price) VALUES ($1, $2, $3, $4, $5)")
            .bind(variation.id).bind(variation.order_item_id).bind(variation.variation_id).bind(&variation.name).bind(variation.price.amount())
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn update_totals(&mut self, order_id: Uuid, subtotal: Money, shipping: Money) -> Result<()> {
        let done = sqlx::query("UPDATE orders SET subtotal = $2, shipping = $3, total = $2 + $3, updated_at = NOW() WHERE id = $1")
            .bind(order_id).bind(subtotal.amount()).bind(shipping.amount())
            .execute(&mut *self.tx).await?;
        if done.rows_affected() == 0 { return Err(OrderError::OrderNotFound(order_id)); }
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        load_order(&mut *self.tx, id, true).await
    }

    async fn update_status(&mut self, change: &StatusChange) -> Result<()> {
        let done = sqlx::query("UPDATE orders SET status = $3, note = COALESCE($4, note), delivery_agent_id = COALESCE(delivery_agent_id, $5), updated_at = NOW() WHERE id = $1 AND status = $2")
            .bind(change.order_id).bind(change.expected.as_str()).bind(change.next.as_str()).bind(&change.note).bind(change.delivery_agent_id)
            .execute(&mut *self.tx).await?;
        if done.rows_affected() == 0 { return Err(OrderError::TransitionConflict(change.order_id)); }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgCatalog { pool: PgPool }

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn find_product_with_extras_and_variations(&self, id: Uuid) -> Result<Option<CatalogProduct>> {
        let Some(p) = sqlx::query_as::<_, ProductRow>("SELECT id, business_id, name, price, is_available FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await? else { return Ok(None) };
        let extras = sqlx::query_as::<_, OptionRow>("SELECT id, name, price FROM product_extras WHERE product_id = $1 ORDER BY name")
            .bind(id).fetch_all(&self.pool).await?;
        let variations = sqlx::query_as::<_, OptionRow>("SELECT id, name, price FROM product_variations WHERE product_id = $1 ORDER BY name")
            .bind(id).fetch_all(&self.pool).await?;
        Ok(Some(CatalogProduct {
            id: p.id, business_id: p.business_id, name: p.name, base_price: p.price.into(), available: p.is_available,
            extras: extras.into_iter().map(|e| ProductExtra { id: e.id, name: e.name, price: e.price.into() }).collect(),
            variations: variations.into_iter().map(|v| ProductVariation { id: v.id, name: v.name, price: v.price.into() }).collect(),
        }))
    }
}

#[derive(Clone)]
pub struct PgCartStore { pool: PgPool }

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn items(&self, key: &str) -> Result<Vec<RequestedItem>> {
        let rows = sqlx::query_as::<_, CartRow>(SELECT_CART)
            .bind(key).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| RequestedItem {
            product_id: r.product_id, quantity: u32::try_from(r.quantity).unwrap_or(0),
            extra_ids: r.extra_ids, variation_ids: r.variation_ids, note: r.note,
        }).collect())
    }

    async fn put(&self, key: &str, items: Vec<RequestedItem>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(key).execute(&mut *tx).await?;
        for (position, item) in (0_i32..).zip(items) {
            let quantity = i32::try_from(item.quantity).map_err(|_| OrderError::Validation("quantity out of range".into()))?;
            sqlx::query(INSERT_CART_ITEM)
                .bind(Uuid::now_v7()).bind(key).bind(position).bind(item.product_id).bind(quantity).bind(&item.extra_ids).bind(&item.variation_ids).bind(&item.note)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(key).execute(&self.pool).await?;
        Ok(())
    }
}
