pub mod aggregator;
pub mod hub;
pub mod reducer;
pub mod registry;

pub use aggregator::Aggregator;
pub use hub::{Subscription, SubscriptionHub};
pub use reducer::Outcome;
pub use registry::EntityRegistry;
