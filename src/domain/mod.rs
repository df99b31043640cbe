//! Order lifecycle domain
pub mod aggregates;
pub mod value_objects;
pub mod pricing;
pub mod policy;

pub use pricing::{AvailabilityGuard, PricingCalculator};
pub use policy::TransitionPolicy;
