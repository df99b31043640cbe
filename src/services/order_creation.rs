//! Order creation: cart lines in, one fully priced order out.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{CartStore, Order, OrderItem, OrderItemExtra, OrderItemVariation, RequestedItem};
use crate::domain::value_objects::Money;
use crate::domain::{AvailabilityGuard, PricingCalculator};
use crate::ledger::{Catalog, LedgerTx, OrderLedger};
use crate::{OrderError, Result};

pub struct OrderCreationPipeline {
    ledger: Arc<dyn OrderLedger>,
    catalog: Arc<dyn Catalog>,
    carts: Arc<dyn CartStore>,
    shipping_fee: Money,
}

impl OrderCreationPipeline {
    pub fn new(ledger: Arc<dyn OrderLedger>, catalog: Arc<dyn Catalog>, carts: Arc<dyn CartStore>) -> Self {
        Self { ledger, catalog, carts, shipping_fee: Money::ZERO }
    }

    pub fn with_shipping_fee(mut self, fee: Money) -> Self {
        self.shipping_fee = fee;
        self
    }

    /// Prices and persists every line in one transaction. Either the whole
    /// order is written or nothing is. On success the cart under `cart_key`
    /// is emptied.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn create_order(&self, user_id: Uuid, items: &[RequestedItem], cart_key: Option<&str>) -> Result<Order> {
        if items.is_empty() { return Err(OrderError::EmptyOrder); }
        for item in items { item.validate()?; }

        let mut tx = self.ledger.begin().await?;
        let order = tx.create_order(user_id).await?;

        let mut subtotal = Money::ZERO;
        for requested in items {
            let line_total = self.add_line(tx.as_mut(), order.id, requested).await?;
            subtotal = subtotal.add(line_total);
        }
        tx.update_totals(order.id, subtotal, self.shipping_fee).await?;

        let order = tx.find_order(order.id).await?.ok_or(OrderError::OrderNotFound(order.id))?;
        tx.commit().await?;
        info!(order_id = %order.id, total = %order.total, "order created");

        if let Some(key) = cart_key {
            if let Err(e) = self.carts.clear(key).await {
                warn!(order_id = %order.id, error = %e, "failed to clear cart after order creation");
            }
        }
        Ok(order)
    }

    /// Places the lines currently held in the cart under `cart_key`.
    pub async fn checkout_cart(&self, user_id: Uuid, cart_key: &str) -> Result<Order> {
        let items = self.carts.items(cart_key).await?;
        self.create_order(user_id, &items, Some(cart_key)).await
    }

    async fn add_line(&self, tx: &mut dyn LedgerTx, order_id: Uuid, requested: &RequestedItem) -> Result<Money> {
        let product = self.catalog.find_product_with_extras_and_variations(requested.product_id).await?
            .ok_or(OrderError::ProductNotFound(requested.product_id))?;
        AvailabilityGuard::ensure(&product)?;

        let extras = product.selected_extras(&requested.extra_ids);
        let variations = product.selected_variations(&requested.variation_ids);
        let unit_price = PricingCalculator::unit_price(&product, &extras);

        let item = OrderItem::priced(order_id, &product, unit_price, requested.quantity()?, requested.note.clone());
        let item = tx.create_order_item(item).await?;
        for extra in extras {
            tx.create_extra(&OrderItemExtra::snapshot(item.id, extra)).await?;
        }
        for variation in variations {
            tx.create_variation(&OrderItemVariation::snapshot(item.id, variation)).await?;
        }
        Ok(item.total_price)
    }
}
