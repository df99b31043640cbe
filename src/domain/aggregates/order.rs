//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::product::{CatalogProduct, ProductExtra, ProductVariation};
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub delivery_agent_id: Option<Uuid>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub note: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A priced order line. Name and price are copied from the catalog when the
/// line is created and never follow later catalog edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub business_id: Uuid,
    pub unit_price: Money,
    pub quantity: Quantity,
    pub total_price: Money,
    pub note: Option<String>,
    pub extras: Vec<OrderItemExtra>,
    pub variations: Vec<OrderItemVariation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItemExtra { pub id: Uuid, pub order_item_id: Uuid, pub extra_id: Uuid, pub name: String, pub price: Money }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItemVariation { pub id: Uuid, pub order_item_id: Uuid, pub variation_id: Uuid, pub name: String, pub price: Money }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    ReadyForPickup,
    DeliveryAssigned,
    PickedUp,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        Self::Pending, Self::Confirmed, Self::ReadyForPickup, Self::DeliveryAssigned,
        Self::PickedUp, Self::Delivered, Self::Cancelled, Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::ReadyForPickup => "READY_FOR_PICKUP",
            Self::DeliveryAssigned => "DELIVERY_ASSIGNED",
            Self::PickedUp => "PICKED_UP",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Rejected)
    }

    /// Form used by the transition table. An order with an assigned courier
    /// is still waiting to be collected.
    pub fn canonical(self) -> Self {
        match self {
            Self::DeliveryAssigned => Self::ReadyForPickup,
            other => other,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    /// Accepts canonical names in any case plus the aliases written by the
    /// older three-step flow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let status = match key.as_str() {
            "PENDING" => Self::Pending,
            "CONFIRMED" | "ACCEPTED" => Self::Confirmed,
            "READY_FOR_PICKUP" | "READY" => Self::ReadyForPickup,
            "DELIVERY_ASSIGNED" | "ASSIGNED" => Self::DeliveryAssigned,
            "PICKED_UP" | "ON_THE_WAY" | "IN_TRANSIT" => Self::PickedUp,
            "DELIVERED" | "COMPLETED" => Self::Delivered,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            "REJECTED" | "DECLINED" => Self::Rejected,
            _ => return Err(UnknownStatus(s.to_string())),
        };
        Ok(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown order status: {}", self.0) }
}

impl Order {
    /// Pending order with zeroed amounts; lines and totals are filled in by the
    /// creation pipeline inside the same transaction.
    pub fn placeholder(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), user_id, delivery_agent_id: None, status: OrderStatus::Pending,
            subtotal: Money::ZERO, shipping: Money::ZERO, total: Money::ZERO, note: None,
            items: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn apply_totals(&mut self, subtotal: Money, shipping: Money) {
        self.subtotal = subtotal;
        self.shipping = shipping;
        self.total = subtotal.add(shipping);
        self.touch();
    }

    /// `total == subtotal + shipping` and the subtotal matches the lines.
    pub fn is_reconciled(&self) -> bool {
        let lines: Money = self.items.iter().map(|i| i.total_price).sum();
        self.total == self.subtotal.add(self.shipping)
            && self.subtotal == lines
            && self.items.iter().all(OrderItem::is_reconciled)
    }

    /// Distinct businesses owning at least one line, in line order.
    pub fn business_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.business_id) { ids.push(item.business_id); }
        }
        ids
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl OrderItem {
    pub fn priced(order_id: Uuid, product: &CatalogProduct, unit_price: Money, quantity: Quantity, note: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(), order_id, product_id: product.id, product_name: product.name.clone(),
            business_id: product.business_id, unit_price, quantity, total_price: unit_price.multiply(quantity),
            note, extras: vec![], variations: vec![],
        }
    }

    pub fn is_reconciled(&self) -> bool { self.total_price == self.unit_price.multiply(self.quantity) }
}

impl OrderItemExtra {
    pub fn snapshot(order_item_id: Uuid, extra: &ProductExtra) -> Self {
        Self { id: Uuid::now_v7(), order_item_id, extra_id: extra.id, name: extra.name.clone(), price: extra.price }
    }
}

impl OrderItemVariation {
    pub fn snapshot(order_item_id: Uuid, variation: &ProductVariation) -> Self {
        Self { id: Uuid::now_v7(), order_item_id, variation_id: variation.id, name: variation.name.clone(), price: variation.price }
    }
}
