//! Line pricing and the availability check that precedes it

use crate::domain::aggregates::{CatalogProduct, ProductExtra};
use crate::domain::value_objects::Money;
use crate::{OrderError, Result};

pub struct AvailabilityGuard;

impl AvailabilityGuard {
    pub fn ensure(product: &CatalogProduct) -> Result<()> {
        if !product.available {
            return Err(OrderError::ProductUnavailable { product_id: product.id, product_name: product.name.clone() });
        }
        Ok(())
    }
}

pub struct PricingCalculator;

impl PricingCalculator {
    /// Base price plus the selected extras.
    ///
    /// Variation prices are not part of the unit price. That is the current
    /// product rule; do not fold them in without a product decision.
    pub fn unit_price(product: &CatalogProduct, extras: &[&ProductExtra]) -> Money {
        extras.iter().fold(product.base_price, |acc, e| acc.add(e.price))
    }
}
