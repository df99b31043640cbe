//! OpenSASE Marketplace Orders
//!
//! Order lifecycle engine for the multi-vendor marketplace.
//!
//! ## Features
//! - Atomic order creation from a cart with price and name snapshots
//! - Role-gated status state machine (client, business, delivery)
//! - Push notification fan-out after every committed transition

pub mod config;
pub mod domain;
pub mod http;
pub mod ledger;
pub mod notifications;
pub mod services;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::ActorRole;

pub use domain::aggregates::{CatalogProduct, Order, OrderItem, RequestedItem};
pub use domain::value_objects::{Actor, Money, Quantity};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Product {product_name} ({product_id}) is not available")]
    ProductUnavailable { product_id: Uuid, product_name: String },

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Order is already {0}")]
    NoOpTransition(OrderStatus),

    #[error("{role} cannot move an order from {from} to {to}")]
    IllegalTransition { role: ActorRole, from: OrderStatus, to: OrderStatus },

    #[error("Order {0} changed status concurrently")]
    TransitionConflict(Uuid),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self { OrderError::StorageError(e.to_string()) }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(e: validator::ValidationErrors) -> Self { OrderError::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_entity() {
        let id = Uuid::nil();
        assert_eq!(OrderError::ProductNotFound(id).to_string(), format!("Product {id} not found"));
        assert_eq!(OrderError::OrderNotFound(id).to_string(), format!("Order {id} not found"));
        let unavailable = OrderError::ProductUnavailable { product_id: id, product_name: "Jollof".into() };
        assert_eq!(unavailable.to_string(), format!("Product Jollof ({id}) is not available"));
    }
}
