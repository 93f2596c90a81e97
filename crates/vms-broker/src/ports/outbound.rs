//! Outbound Ports (Driven Ports)
//!
//! Capabilities the broker needs from its environment: a way to call clients
//! back and learn when they die, a statistics sink, the identity of the
//! calling process, and shared memory regions for large payloads.

use std::sync::{Arc, Weak};
use vms_types::{
    AvailableLayers, ClientToken, ConnectionState, Layer, ProcessId, ProviderId,
    SubscriptionState,
};

use crate::error::{DeliveryError, LinkError, SharedMemoryError};

/// Callback interface of one registered client.
///
/// Deliveries are fire-and-forget from the broker's point of view: errors are
/// logged and never reach the operation that triggered the delivery.
pub trait ClientCallback: Send + Sync {
    fn on_layer_availability_changed(&self, layers: &AvailableLayers) -> Result<(), DeliveryError>;

    fn on_subscription_state_changed(&self, state: &SubscriptionState) -> Result<(), DeliveryError>;

    fn on_packet_received(
        &self,
        provider_id: ProviderId,
        layer: &Layer,
        payload: &[u8],
    ) -> Result<(), DeliveryError>;

    /// The region is only valid for the duration of this call.
    fn on_large_packet_received(
        &self,
        provider_id: ProviderId,
        layer: &Layer,
        packet: &dyn SharedMemory,
    ) -> Result<(), DeliveryError>;

    /// Arrange for `notifier` to fire when the client's process dies.
    ///
    /// The notifier may fire at any time once this is called, from any
    /// thread, including from within this call and before the registration
    /// that requested the watch has returned. The broker treats that as an
    /// ordinary death and removes the client once registration completes.
    fn watch_liveness(&self, notifier: DeathNotifier) -> Result<Box<dyn LivenessWatch>, LinkError>;
}

/// Handle returned by [`ClientCallback::watch_liveness`].
pub trait LivenessWatch: Send + Sync {
    /// Stop watching. The notifier must not fire afterwards.
    fn cancel(&self);
}

/// Receives the death of a client.
pub(crate) trait ClientReaper: Send + Sync {
    fn reap(&self, token: ClientToken);
}

/// Fires the broker's disconnect path for one client.
///
/// Holds only a weak reference to the broker, so a notifier kept alive by a
/// client never keeps the broker alive.
#[derive(Clone)]
pub struct DeathNotifier {
    token: ClientToken,
    reaper: Weak<dyn ClientReaper>,
}

impl DeathNotifier {
    pub(crate) fn new(token: ClientToken, reaper: Weak<dyn ClientReaper>) -> Self {
        Self { token, reaper }
    }

    pub fn token(&self) -> ClientToken {
        self.token
    }

    /// Report the client as dead. A no-op once the broker is gone.
    pub fn notify(&self) {
        if let Some(reaper) = self.reaper.upgrade() {
            reaper.reap(self.token);
        }
    }
}

impl std::fmt::Debug for DeathNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeathNotifier")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Statistics for one owning process.
pub trait ClientLogger: Send + Sync {
    fn log_connection_state(&self, state: ConnectionState);

    fn log_packet_sent(&self, layer: &Layer, bytes: usize);

    fn log_packet_received(&self, layer: &Layer, bytes: usize);

    fn log_packet_dropped(&self, layer: &Layer, bytes: usize);
}

/// Statistics sink keyed by owning process.
pub trait StatsService: Send + Sync {
    fn client_logger(&self, process: ProcessId) -> Arc<dyn ClientLogger>;
}

/// Resolves the process making the current call.
pub trait CallerIdentity: Send + Sync {
    fn calling_process(&self) -> ProcessId;
}

impl<F> CallerIdentity for F
where
    F: Fn() -> ProcessId + Send + Sync,
{
    fn calling_process(&self) -> ProcessId {
        self()
    }
}

/// A memory region owned outside the broker.
pub trait SharedMemory: Send + Sync {
    fn size(&self) -> usize;

    /// Copy the region's contents.
    fn read(&self) -> Result<Vec<u8>, SharedMemoryError>;

    /// Release the region. Reads after close fail.
    fn close(&self);
}
