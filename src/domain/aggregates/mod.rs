//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{CatalogProduct, ProductExtra, ProductVariation};
pub use order::{Order, OrderItem, OrderItemExtra, OrderItemVariation, OrderStatus, UnknownStatus};
pub use cart::{CartStore, MemoryCartStore, RequestedItem};
