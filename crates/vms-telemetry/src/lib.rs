//! # VMS Telemetry
//!
//! Observability wiring for the Vehicle Map Service broker.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an `EnvFilter` and either a
//!   human-readable or a JSON formatter.
//! - **Metrics**: Prometheus counters for client connections and packet
//!   traffic, labelled by owning process and layer.
//!
//! Library crates only emit `tracing` events; installing the subscriber is
//! left to the embedding binary through [`init_telemetry`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vms_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Broker runs here
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VMS_SERVICE_NAME` | `vms-broker` | Service name attached to log lines |
//! | `VMS_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `VMS_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `VMS_JSON_LOGS` | `false` | JSON formatted logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, ACTIVE_CLIENTS, CLIENT_CONNECTIONS,
    PACKETS_DROPPED, PACKETS_RECEIVED, PACKETS_SENT, PACKET_BYTES_DROPPED,
    PACKET_BYTES_RECEIVED, PACKET_BYTES_SENT, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global log subscriber.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that nothing logged during startup is missed
    let metrics = register_metrics()?;
    init_logging(&config)?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}

/// Increment a counter, optionally with label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Add a value to a counter with label values.
#[macro_export]
macro_rules! metric_add {
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).inc_by($value)
    };
}
