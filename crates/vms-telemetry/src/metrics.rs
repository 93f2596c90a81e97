//! Prometheus metrics for the VMS broker.
//!
//! All metrics follow the naming convention: `vms_<area>_<metric>_<unit>`.
//! Packet metrics carry the owning `process` and the `layer` rendered as
//! `type/subtype/version`.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CLIENT METRICS
    // =========================================================================

    /// Connection state transitions per process
    pub static ref CLIENT_CONNECTIONS: CounterVec = CounterVec::new(
        Opts::new("vms_client_connection_events_total", "Client connection state transitions"),
        &["process", "state"]  // state: connected/disconnected
    ).expect("metric creation failed");

    /// Currently connected clients
    pub static ref ACTIVE_CLIENTS: IntGauge = IntGauge::new(
        "vms_clients_active",
        "Number of currently connected clients"
    ).expect("metric creation failed");

    // =========================================================================
    // PACKET METRICS
    // =========================================================================

    /// Packets accepted for routing, by publishing process
    pub static ref PACKETS_SENT: CounterVec = CounterVec::new(
        Opts::new("vms_packets_sent_total", "Packets published"),
        &["process", "layer"]
    ).expect("metric creation failed");

    /// Bytes accepted for routing, by publishing process
    pub static ref PACKET_BYTES_SENT: CounterVec = CounterVec::new(
        Opts::new("vms_packet_sent_bytes_total", "Payload bytes published"),
        &["process", "layer"]
    ).expect("metric creation failed");

    /// Packets delivered, by receiving process
    pub static ref PACKETS_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("vms_packets_received_total", "Packets delivered to subscribers"),
        &["process", "layer"]
    ).expect("metric creation failed");

    /// Bytes delivered, by receiving process
    pub static ref PACKET_BYTES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("vms_packet_received_bytes_total", "Payload bytes delivered to subscribers"),
        &["process", "layer"]
    ).expect("metric creation failed");

    /// Packets that matched no subscriber
    pub static ref PACKETS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("vms_packets_dropped_total", "Packets with no recipients"),
        &["process", "layer"]
    ).expect("metric creation failed");

    /// Bytes of packets that matched no subscriber
    pub static ref PACKET_BYTES_DROPPED: CounterVec = CounterVec::new(
        Opts::new("vms_packet_dropped_bytes_total", "Payload bytes with no recipients"),
        &["process", "layer"]
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Clients
        Box::new(CLIENT_CONNECTIONS.clone()),
        Box::new(ACTIVE_CLIENTS.clone()),
        // Packets
        Box::new(PACKETS_SENT.clone()),
        Box::new(PACKET_BYTES_SENT.clone()),
        Box::new(PACKETS_RECEIVED.clone()),
        Box::new(PACKET_BYTES_RECEIVED.clone()),
        Box::new(PACKETS_DROPPED.clone()),
        Box::new(PACKET_BYTES_DROPPED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
