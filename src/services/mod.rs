//! Application services
pub mod order_creation;
pub mod status_transition;

pub use order_creation::OrderCreationPipeline;
pub use status_transition::StatusTransitionService;
