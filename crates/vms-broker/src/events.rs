//! Owned form of the callbacks a client receives.
//!
//! Used by adapters that move deliveries off the calling thread or record
//! them for later inspection.

use vms_types::{AvailableLayers, Layer, ProviderId, SubscriptionState};

/// One delivery from the broker to a client
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerEvent {
    LayerAvailabilityChanged(AvailableLayers),
    SubscriptionStateChanged(SubscriptionState),
    /// Inline and large packets alike; large payloads are copied out of
    /// their shared memory region.
    PacketReceived {
        provider_id: ProviderId,
        layer: Layer,
        payload: Vec<u8>,
    },
}

impl BrokerEvent {
    pub fn is_packet(&self) -> bool {
        matches!(self, Self::PacketReceived { .. })
    }
}
