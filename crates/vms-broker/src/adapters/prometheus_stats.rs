//! Statistics exported through the `vms-telemetry` Prometheus registry.

use std::sync::Arc;
use vms_telemetry::{
    metric_add, metric_inc, register_metrics, TelemetryError, ACTIVE_CLIENTS,
    CLIENT_CONNECTIONS, PACKETS_DROPPED, PACKETS_RECEIVED, PACKETS_SENT, PACKET_BYTES_DROPPED,
    PACKET_BYTES_RECEIVED, PACKET_BYTES_SENT,
};
use vms_types::{ConnectionState, Layer, ProcessId};

use crate::ports::{ClientLogger, StatsService};

/// [`StatsService`] backed by global Prometheus counters.
pub struct PrometheusStatsService {
    _private: (),
}

impl PrometheusStatsService {
    /// Registers the counters if that has not happened yet.
    pub fn new() -> Result<Self, TelemetryError> {
        register_metrics()?;
        Ok(Self { _private: () })
    }
}

struct PrometheusClientLogger {
    process: String,
}

impl PrometheusClientLogger {
    fn traffic_labels<'a>(&'a self, layer: &'a str) -> [&'a str; 2] {
        [self.process.as_str(), layer]
    }
}

impl ClientLogger for PrometheusClientLogger {
    fn log_connection_state(&self, state: ConnectionState) {
        metric_inc!(CLIENT_CONNECTIONS, &[self.process.as_str(), state.as_str()]);
        match state {
            ConnectionState::Connected => ACTIVE_CLIENTS.inc(),
            ConnectionState::Disconnected => ACTIVE_CLIENTS.dec(),
        }
    }

    fn log_packet_sent(&self, layer: &Layer, bytes: usize) {
        let layer = layer.to_string();
        let labels = self.traffic_labels(&layer);
        metric_inc!(PACKETS_SENT, &labels);
        metric_add!(PACKET_BYTES_SENT, &labels, bytes as f64);
    }

    fn log_packet_received(&self, layer: &Layer, bytes: usize) {
        let layer = layer.to_string();
        let labels = self.traffic_labels(&layer);
        metric_inc!(PACKETS_RECEIVED, &labels);
        metric_add!(PACKET_BYTES_RECEIVED, &labels, bytes as f64);
    }

    fn log_packet_dropped(&self, layer: &Layer, bytes: usize) {
        let layer = layer.to_string();
        let labels = self.traffic_labels(&layer);
        metric_inc!(PACKETS_DROPPED, &labels);
        metric_add!(PACKET_BYTES_DROPPED, &labels, bytes as f64);
    }
}

impl StatsService for PrometheusStatsService {
    fn client_logger(&self, process: ProcessId) -> Arc<dyn ClientLogger> {
        Arc::new(PrometheusClientLogger {
            process: process.to_string(),
        })
    }
}
