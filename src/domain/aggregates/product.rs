//! Catalog Product, read-only from the order engine's side

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub base_price: Money,
    pub available: bool,
    pub extras: Vec<ProductExtra>,
    pub variations: Vec<ProductVariation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)] pub struct ProductExtra { pub id: Uuid, pub name: String, pub price: Money }
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)] pub struct ProductVariation { pub id: Uuid, pub name: String, pub price: Money }

impl CatalogProduct {
    pub fn new(id: Uuid, business_id: Uuid, name: impl Into<String>, base_price: Money) -> Self {
        Self { id, business_id, name: name.into(), base_price, available: true, extras: vec![], variations: vec![] }
    }

    pub fn with_extra(mut self, name: impl Into<String>, price: Money) -> Self {
        self.extras.push(ProductExtra { id: Uuid::new_v4(), name: name.into(), price });
        self
    }

    pub fn with_variation(mut self, name: impl Into<String>, price: Money) -> Self {
        self.variations.push(ProductVariation { id: Uuid::new_v4(), name: name.into(), price });
        self
    }

    pub fn unavailable(mut self) -> Self { self.available = false; self }

    /// Extras whose ids were requested, in catalog order. Unknown ids are dropped.
    pub fn selected_extras(&self, ids: &[Uuid]) -> Vec<&ProductExtra> {
        self.extras.iter().filter(|e| ids.contains(&e.id)).collect()
    }

    /// Variations whose ids were requested, in catalog order. Unknown ids are dropped.
    pub fn selected_variations(&self, ids: &[Uuid]) -> Vec<&ProductVariation> {
        self.variations.iter().filter(|v| ids.contains(&v.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_selection_ignores_unknown_ids() {
        let p = CatalogProduct::new(Uuid::new_v4(), Uuid::new_v4(), "Suya", Money::from_minor(1500))
            .with_extra("Onions", Money::from_minor(100))
            .with_extra("Pepper", Money::from_minor(50))
            .with_variation("Large", Money::from_minor(300));
        let wanted = vec![p.extras[1].id, Uuid::new_v4()];
        let picked = p.selected_extras(&wanted);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Pepper");
        assert!(p.selected_variations(&[Uuid::new_v4()]).is_empty());
    }
}
