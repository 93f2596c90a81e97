//! Broker-level counters
//!
//! Lock-free counters kept alongside the broker state. Per-process traffic
//! statistics go through the `StatsService` port instead; these counters
//! describe the broker itself and are included in diagnostic dumps.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Broker counters
#[derive(Default)]
pub struct Metrics {
    /// Successful client registrations
    pub clients_registered: AtomicU64,
    /// Clients removed through `unregister_client`
    pub clients_unregistered: AtomicU64,
    /// Clients removed because their process died
    pub clients_died: AtomicU64,
    /// Packets accepted for routing
    pub packets_published: AtomicU64,
    /// Individual packet deliveries attempted
    pub packets_delivered: AtomicU64,
    /// Packets that matched no recipient
    pub packets_dropped: AtomicU64,
    /// Callback deliveries that reported an error
    pub delivery_failures: AtomicU64,
    /// Availability snapshots broadcast
    pub availability_updates: AtomicU64,
    /// Subscription snapshots broadcast
    pub subscription_updates: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registered(&self) {
        self.clients_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self, died: bool) {
        if died {
            self.clients_died.fetch_add(1, Ordering::Relaxed);
        } else {
            self.clients_unregistered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one routed packet and how many clients it reached
    pub fn record_published(&self, recipients: usize) {
        self.packets_published.fetch_add(1, Ordering::Relaxed);
        if recipients == 0 {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.packets_delivered
                .fetch_add(recipients as u64, Ordering::Relaxed);
        }
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_availability_update(&self) {
        self.availability_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_subscription_update(&self) {
        self.subscription_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clients_registered: self.clients_registered.load(Ordering::Relaxed),
            clients_unregistered: self.clients_unregistered.load(Ordering::Relaxed),
            clients_died: self.clients_died.load(Ordering::Relaxed),
            packets_published: self.packets_published.load(Ordering::Relaxed),
            packets_delivered: self.packets_delivered.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            availability_updates: self.availability_updates.load(Ordering::Relaxed),
            subscription_updates: self.subscription_updates.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub clients_registered: u64,
    pub clients_unregistered: u64,
    pub clients_died: u64,
    pub packets_published: u64,
    pub packets_delivered: u64,
    pub packets_dropped: u64,
    pub delivery_failures: u64,
    pub availability_updates: u64,
    pub subscription_updates: u64,
}
