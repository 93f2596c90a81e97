//! Domain layer for the VMS broker
//!
//! Pure state and algorithms with no I/O and no locking:
//!
//! - `ProviderRegistry`: content-addressed provider ids
//! - `LayerAvailabilityResolver`: dependency fixpoint over offerings
//! - `ClientSubscriptions`: per-client subscription set and global merge
//! - `BrokerConfig` / `ClientConfig`: configuration with validation

pub mod availability;
pub mod config;
pub mod provider_registry;
pub mod subscriptions;

pub use availability::LayerAvailabilityResolver;
pub use config::{BrokerConfig, ClientConfig, SequencePolicy};
pub use provider_registry::ProviderRegistry;
pub use subscriptions::{merge_subscriptions, ClientSubscriptions, MergedSubscriptions};
