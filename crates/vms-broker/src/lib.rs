//! # VMS Broker
//!
//! Publish/subscribe broker for the Vehicle Map Service. Clients register,
//! announce the map layers their providers can produce, subscribe to layers
//! they want to consume, and publish packets that the broker routes to every
//! matching subscriber.
//!
//! ## Responsibilities
//!
//! - Assign stable provider ids by description content
//! - Resolve which offered layers are available, honouring dependencies
//! - Merge per-client subscriptions into one global subscription state
//! - Broadcast sequence-numbered availability and subscription snapshots
//! - Route packets, small or shared-memory backed, to subscribers and monitors
//! - Detect client death and clean up as if the client had unregistered
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     VmsBrokerService                     │
//! │  ┌──────────────────┐  ┌──────────────────────────────┐  │
//! │  │ ProviderRegistry │  │  LayerAvailabilityResolver   │  │
//! │  └──────────────────┘  └──────────────────────────────┘  │
//! │  ┌──────────────────┐  ┌──────────────────────────────┐  │
//! │  │ ClientRecord map │  │  ClientSubscriptions merge   │  │
//! │  └──────────────────┘  └──────────────────────────────┘  │
//! └───────────────▲──────────────────────────┬───────────────┘
//!                 │ VmsBrokerApi             │ ClientCallback
//!          VmsClient / transports     StatsService / ClientLogger
//! ```
//!
//! ## Locking
//!
//! All broker state sits behind one mutex. Every operation validates,
//! mutates and snapshots under that lock, then releases it before any
//! callback or statistics call. Callbacks may therefore call back into the
//! broker without deadlocking.
//!
//! ## Sequence numbers
//!
//! Availability and subscription snapshots carry independent sequence
//! numbers starting at 0. With [`SequencePolicy::EveryUpdate`] each mutation
//! of the relevant inputs advances the number; with
//! [`SequencePolicy::OnChange`] it only advances when the content changes.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vms_broker::{InMemoryStatsService, VmsBrokerService, VmsClient};
//!
//! let broker = VmsBrokerService::new(
//!     Arc::new(InMemoryStatsService::new()),
//!     Arc::new(|| std::process::id() as i64),
//! );
//! let client = VmsClient::connect(Arc::new(broker.clone()), callback)?;
//! let provider_id = client.register_provider(b"map provider")?;
//! ```

pub mod adapters;
pub mod client;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    ChannelCallback, ClientStats, HeapSharedMemory, InMemoryStatsService, LayerTraffic,
    NoOpStatsService, PrometheusStatsService, RecordingCallback,
};
pub use client::{VmsClient, VmsClientCallback};
pub use domain::{BrokerConfig, ClientConfig, SequencePolicy};
pub use error::{
    BrokerError, ConfigError, DeliveryError, ErrorKind, LinkError, SharedMemoryError,
};
pub use events::BrokerEvent;
pub use metrics::MetricsSnapshot;
pub use ports::{
    CallerIdentity, ClientCallback, ClientLogger, DeathNotifier, LivenessWatch, SharedMemory,
    StatsService, VmsBrokerApi,
};
pub use service::{BrokerDump, ClientDump, VmsBrokerService};
pub use vms_types;
