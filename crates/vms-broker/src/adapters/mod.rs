//! Adapters for the outbound ports
//!
//! - `ChannelCallback`: forwards deliveries over a tokio channel
//! - `RecordingCallback`: keeps every delivery in memory
//! - `HeapSharedMemory`: heap-backed shared memory region
//! - `InMemoryStatsService` / `NoOpStatsService`: statistics sinks
//! - `PrometheusStatsService`: statistics exported as Prometheus counters

pub mod channel;
pub mod prometheus_stats;
pub mod recording;
pub mod shared_memory;
pub mod stats;

pub use channel::ChannelCallback;
pub use prometheus_stats::PrometheusStatsService;
pub use recording::RecordingCallback;
pub use shared_memory::HeapSharedMemory;
pub use stats::{ClientStats, InMemoryStatsService, LayerTraffic, NoOpStatsService};
