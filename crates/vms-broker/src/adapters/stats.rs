//! In-memory statistics sinks.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vms_types::{ConnectionState, Layer, ProcessId};

use crate::ports::{ClientLogger, StatsService};

/// Packet and byte totals for one layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerTraffic {
    pub packets: u64,
    pub bytes: u64,
}

impl LayerTraffic {
    fn record(&mut self, bytes: usize) {
        self.packets += 1;
        self.bytes += bytes as u64;
    }
}

/// Everything logged for one process
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub connection_events: Vec<ConnectionState>,
    pub sent: BTreeMap<Layer, LayerTraffic>,
    pub received: BTreeMap<Layer, LayerTraffic>,
    pub dropped: BTreeMap<Layer, LayerTraffic>,
}

impl ClientStats {
    pub fn sent_for(&self, layer: &Layer) -> LayerTraffic {
        self.sent.get(layer).copied().unwrap_or_default()
    }

    pub fn received_for(&self, layer: &Layer) -> LayerTraffic {
        self.received.get(layer).copied().unwrap_or_default()
    }

    pub fn dropped_for(&self, layer: &Layer) -> LayerTraffic {
        self.dropped.get(layer).copied().unwrap_or_default()
    }
}

struct InMemoryClientLogger {
    stats: Mutex<ClientStats>,
}

impl ClientLogger for InMemoryClientLogger {
    fn log_connection_state(&self, state: ConnectionState) {
        self.stats.lock().connection_events.push(state);
    }

    fn log_packet_sent(&self, layer: &Layer, bytes: usize) {
        self.stats.lock().sent.entry(*layer).or_default().record(bytes);
    }

    fn log_packet_received(&self, layer: &Layer, bytes: usize) {
        self.stats.lock().received.entry(*layer).or_default().record(bytes);
    }

    fn log_packet_dropped(&self, layer: &Layer, bytes: usize) {
        self.stats.lock().dropped.entry(*layer).or_default().record(bytes);
    }
}

/// Keeps per-process statistics in memory.
#[derive(Default)]
pub struct InMemoryStatsService {
    loggers: Mutex<HashMap<ProcessId, Arc<InMemoryClientLogger>>>,
}

impl InMemoryStatsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics for `process`; empty if nothing was logged for it.
    pub fn stats_for(&self, process: ProcessId) -> ClientStats {
        self.loggers
            .lock()
            .get(&process)
            .map(|logger| logger.stats.lock().clone())
            .unwrap_or_default()
    }

    /// Processes that have been handed a logger, in ascending order.
    pub fn processes(&self) -> Vec<ProcessId> {
        let mut processes: Vec<_> = self.loggers.lock().keys().copied().collect();
        processes.sort_unstable();
        processes
    }
}

impl StatsService for InMemoryStatsService {
    fn client_logger(&self, process: ProcessId) -> Arc<dyn ClientLogger> {
        let mut loggers = self.loggers.lock();
        let logger = loggers.entry(process).or_insert_with(|| {
            Arc::new(InMemoryClientLogger {
                stats: Mutex::new(ClientStats::default()),
            })
        });
        Arc::clone(logger) as Arc<dyn ClientLogger>
    }
}

/// Discards all statistics.
#[derive(Default)]
pub struct NoOpStatsService;

struct NoOpClientLogger;

impl ClientLogger for NoOpClientLogger {
    fn log_connection_state(&self, _: ConnectionState) {}
    fn log_packet_sent(&self, _: &Layer, _: usize) {}
    fn log_packet_received(&self, _: &Layer, _: usize) {}
    fn log_packet_dropped(&self, _: &Layer, _: usize) {}
}

impl StatsService for NoOpStatsService {
    fn client_logger(&self, _: ProcessId) -> Arc<dyn ClientLogger> {
        Arc::new(NoOpClientLogger)
    }
}
