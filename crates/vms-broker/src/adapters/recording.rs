//! Client callback that records every delivery.
//!
//! Handy for embedding code that polls rather than reacts, and for tests:
//! the process death of the client can be simulated with [`RecordingCallback::kill`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use vms_types::{AvailableLayers, Layer, ProviderId, SubscriptionState};

use crate::error::{DeliveryError, LinkError};
use crate::events::BrokerEvent;
use crate::ports::{ClientCallback, DeathNotifier, LivenessWatch, SharedMemory};

#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<BrokerEvent>>,
    notifier: Arc<Mutex<Option<DeathNotifier>>>,
    dead: AtomicBool,
    failing: AtomicBool,
    watches_bound: AtomicUsize,
    watches_cancelled: Arc<AtomicUsize>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback whose process is already gone; binding a watch fails.
    pub fn dead() -> Self {
        let callback = Self::default();
        callback.dead.store(true, Ordering::SeqCst);
        callback
    }

    /// Simulate process death: subsequent deliveries fail and the bound
    /// notifier, if any, fires.
    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
        let notifier = self.notifier.lock().take();
        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }

    /// Make deliveries fail without killing the client.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn availability_updates(&self) -> Vec<AvailableLayers> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BrokerEvent::LayerAvailabilityChanged(layers) => Some(layers.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn subscription_updates(&self) -> Vec<SubscriptionState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BrokerEvent::SubscriptionStateChanged(state) => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn packets(&self) -> Vec<(ProviderId, Layer, Vec<u8>)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BrokerEvent::PacketReceived {
                    provider_id,
                    layer,
                    payload,
                } => Some((*provider_id, *layer, payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn watches_bound(&self) -> usize {
        self.watches_bound.load(Ordering::SeqCst)
    }

    pub fn watches_cancelled(&self) -> usize {
        self.watches_cancelled.load(Ordering::SeqCst)
    }

    fn record(&self, event: BrokerEvent) -> Result<(), DeliveryError> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(DeliveryError::ClientGone);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Failed("delivery disabled".to_string()));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

impl ClientCallback for RecordingCallback {
    fn on_layer_availability_changed(&self, layers: &AvailableLayers) -> Result<(), DeliveryError> {
        self.record(BrokerEvent::LayerAvailabilityChanged(layers.clone()))
    }

    fn on_subscription_state_changed(&self, state: &SubscriptionState) -> Result<(), DeliveryError> {
        self.record(BrokerEvent::SubscriptionStateChanged(state.clone()))
    }

    fn on_packet_received(
        &self,
        provider_id: ProviderId,
        layer: &Layer,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        self.record(BrokerEvent::PacketReceived {
            provider_id,
            layer: *layer,
            payload: payload.to_vec(),
        })
    }

    fn on_large_packet_received(
        &self,
        provider_id: ProviderId,
        layer: &Layer,
        packet: &dyn SharedMemory,
    ) -> Result<(), DeliveryError> {
        let payload = packet
            .read()
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;
        self.record(BrokerEvent::PacketReceived {
            provider_id,
            layer: *layer,
            payload,
        })
    }

    fn watch_liveness(&self, notifier: DeathNotifier) -> Result<Box<dyn LivenessWatch>, LinkError> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(LinkError::ClientDead);
        }
        self.watches_bound.fetch_add(1, Ordering::SeqCst);
        *self.notifier.lock() = Some(notifier);

        Ok(Box::new(RecordingWatch {
            notifier: Arc::clone(&self.notifier),
            cancelled: Arc::clone(&self.watches_cancelled),
        }))
    }
}

struct RecordingWatch {
    notifier: Arc<Mutex<Option<DeathNotifier>>>,
    cancelled: Arc<AtomicUsize>,
}

impl LivenessWatch for RecordingWatch {
    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        self.notifier.lock().take();
    }
}
