//! Channel-backed client callback.
//!
//! Every delivery becomes a [`BrokerEvent`] on an unbounded tokio channel,
//! so an async task can consume broker output at its own pace. The client is
//! considered dead once the receiving half is dropped.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;
use vms_types::{AvailableLayers, Layer, ProviderId, SubscriptionState};

use crate::error::{DeliveryError, LinkError};
use crate::events::BrokerEvent;
use crate::ports::{ClientCallback, DeathNotifier, LivenessWatch, SharedMemory};

/// [`ClientCallback`] that forwards deliveries into an mpsc channel.
#[derive(Clone, Debug)]
pub struct ChannelCallback {
    sender: mpsc::UnboundedSender<BrokerEvent>,
}

impl ChannelCallback {
    /// Create the callback and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: BrokerEvent) -> Result<(), DeliveryError> {
        self.sender
            .send(event)
            .map_err(|_| DeliveryError::ClientGone)
    }
}

impl ClientCallback for ChannelCallback {
    fn on_layer_availability_changed(&self, layers: &AvailableLayers) -> Result<(), DeliveryError> {
        self.send(BrokerEvent::LayerAvailabilityChanged(layers.clone()))
    }

    fn on_subscription_state_changed(&self, state: &SubscriptionState) -> Result<(), DeliveryError> {
        self.send(BrokerEvent::SubscriptionStateChanged(state.clone()))
    }

    fn on_packet_received(
        &self,
        provider_id: ProviderId,
        layer: &Layer,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        self.send(BrokerEvent::PacketReceived {
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
        self.send(BrokerEvent::PacketReceived {
            provider_id,
            layer: *layer,
            payload,
        })
    }

    /// Spawns a task on the current tokio runtime that fires `notifier` when
    /// the receiver is dropped. On a multi-threaded runtime the task may fire
    /// before registration returns. Outside a runtime only explicit
    /// unregistration removes the client.
    fn watch_liveness(&self, notifier: DeathNotifier) -> Result<Box<dyn LivenessWatch>, LinkError> {
        if self.sender.is_closed() {
            return Err(LinkError::ClientDead);
        }

        let Ok(runtime) = Handle::try_current() else {
            debug!(token = %notifier.token(), "No tokio runtime, liveness is not watched");
            return Ok(Box::new(UnwatchedLiveness));
        };

        let sender = self.sender.clone();
        let task = runtime.spawn(async move {
            sender.closed().await;
            notifier.notify();
        });

        Ok(Box::new(ClosedChannelWatch {
            task: task.abort_handle(),
        }))
    }
}

struct ClosedChannelWatch {
    task: AbortHandle,
}

impl LivenessWatch for ClosedChannelWatch {
    fn cancel(&self) {
        self.task.abort();
    }
}

struct UnwatchedLiveness;

impl LivenessWatch for UnwatchedLiveness {
    fn cancel(&self) {}
}
