//! In-process client
//!
//! [`VmsClient`] wraps one broker registration for code living in the same
//! process as the broker. It keeps the latest availability and subscription
//! snapshots, ignores snapshots that arrive out of order, and hides the
//! large-packet path: payloads at or above the configured threshold are
//! published through a shared memory region, and receivers always get plain
//! bytes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use vms_types::{
    AssociatedLayer, AvailableLayers, ClientToken, Layer, LayerDependency, ProviderId,
    ProviderInfo, SubscriptionState,
};

use crate::adapters::HeapSharedMemory;
use crate::domain::ClientConfig;
use crate::error::{BrokerError, DeliveryError, LinkError};
use crate::ports::{ClientCallback, DeathNotifier, LivenessWatch, SharedMemory, VmsBrokerApi};

/// What an in-process client is told about.
pub trait VmsClientCallback: Send + Sync {
    fn on_layer_availability_changed(&self, layers: &AvailableLayers);

    fn on_subscription_state_changed(&self, state: &SubscriptionState);

    fn on_packet_received(&self, provider_id: ProviderId, layer: &Layer, payload: &[u8]);
}

#[derive(Default)]
struct ClientCache {
    available_layers: Option<AvailableLayers>,
    subscription_state: Option<SubscriptionState>,
}

/// Adapts broker deliveries to a [`VmsClientCallback`] and keeps the cache.
struct ClientBridge {
    user: Arc<dyn VmsClientCallback>,
    cache: Arc<Mutex<ClientCache>>,
}

impl ClientBridge {
    fn apply_available_layers(&self, layers: &AvailableLayers) {
        {
            let mut cache = self.cache.lock();
            if cache
                .available_layers
                .as_ref()
                .is_some_and(|cached| cached.sequence >= layers.sequence)
            {
                debug!(sequence = layers.sequence, "Ignoring stale layer availability");
                return;
            }
            cache.available_layers = Some(layers.clone());
        }
        self.user.on_layer_availability_changed(layers);
    }

    fn apply_subscription_state(&self, state: &SubscriptionState) {
        {
            let mut cache = self.cache.lock();
            if cache
                .subscription_state
                .as_ref()
                .is_some_and(|cached| cached.sequence >= state.sequence)
            {
                debug!(sequence = state.sequence, "Ignoring stale subscription state");
                return;
            }
            cache.subscription_state = Some(state.clone());
        }
        self.user.on_subscription_state_changed(state);
    }
}

impl ClientCallback for ClientBridge {
    fn on_layer_availability_changed(&self, layers: &AvailableLayers) -> Result<(), DeliveryError> {
        self.apply_available_layers(layers);
        Ok(())
    }

    fn on_subscription_state_changed(&self, state: &SubscriptionState) -> Result<(), DeliveryError> {
        self.apply_subscription_state(state);
        Ok(())
    }

    fn on_packet_received(
        &self,
        provider_id: ProviderId,
        layer: &Layer,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        self.user.on_packet_received(provider_id, layer, payload);
        Ok(())
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
        self.user.on_packet_received(provider_id, layer, &payload);
        Ok(())
    }

    fn watch_liveness(&self, _notifier: DeathNotifier) -> Result<Box<dyn LivenessWatch>, LinkError> {
        // Lives exactly as long as the owning VmsClient, which unregisters on drop
        Ok(Box::new(InProcessWatch))
    }
}

struct InProcessWatch;

impl LivenessWatch for InProcessWatch {
    fn cancel(&self) {}
}

/// A broker registration owned by in-process code.
///
/// Dropping the client unregisters it.
pub struct VmsClient {
    broker: Arc<dyn VmsBrokerApi>,
    token: ClientToken,
    config: ClientConfig,
    cache: Arc<Mutex<ClientCache>>,
    monitoring: AtomicBool,
    connected: AtomicBool,
}

impl VmsClient {
    /// Register a new non-legacy client with the default configuration.
    ///
    /// The initial snapshots are delivered to `callback` before this returns.
    pub fn connect(
        broker: Arc<dyn VmsBrokerApi>,
        callback: Arc<dyn VmsClientCallback>,
    ) -> Result<Self, BrokerError> {
        Self::connect_with_config(broker, callback, false, ClientConfig::default())
    }

    pub fn connect_with_config(
        broker: Arc<dyn VmsBrokerApi>,
        callback: Arc<dyn VmsClientCallback>,
        legacy: bool,
        config: ClientConfig,
    ) -> Result<Self, BrokerError> {
        let token = ClientToken::new();
        let cache = Arc::new(Mutex::new(ClientCache::default()));
        let bridge = Arc::new(ClientBridge {
            user: callback,
            cache: Arc::clone(&cache),
        });

        let info = broker.register_client(token, Arc::clone(&bridge) as Arc<dyn ClientCallback>, legacy)?;
        bridge.apply_available_layers(&info.available_layers);
        bridge.apply_subscription_state(&info.subscription_state);

        Ok(Self {
            broker,
            token,
            config,
            cache,
            monitoring: AtomicBool::new(false),
            connected: AtomicBool::new(true),
        })
    }

    pub fn token(&self) -> ClientToken {
        self.token
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Latest availability snapshot seen by this client.
    pub fn available_layers(&self) -> AvailableLayers {
        self.cache.lock().available_layers.clone().unwrap_or_default()
    }

    /// Latest subscription snapshot seen by this client.
    pub fn subscription_state(&self) -> SubscriptionState {
        self.cache.lock().subscription_state.clone().unwrap_or_default()
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Register a provider description and take ownership of its id.
    pub fn register_provider(&self, description: &[u8]) -> Result<ProviderId, BrokerError> {
        self.broker
            .register_provider(self.token, ProviderInfo::new(description))
    }

    /// Withdraw everything offered under `provider_id`.
    ///
    /// Ids this client does not own are ignored.
    pub fn unregister_provider(&self, provider_id: ProviderId) -> Result<(), BrokerError> {
        match self
            .broker
            .set_provider_offerings(self.token, provider_id, Vec::new())
        {
            Err(BrokerError::ProviderNotOwned { .. }) => {
                debug!(token = %self.token, provider_id, "Ignoring unregister of foreign provider");
                Ok(())
            }
            other => other,
        }
    }

    /// Description registered for `provider_id`, if any.
    pub fn provider_description(&self, provider_id: ProviderId) -> Result<Option<Vec<u8>>, BrokerError> {
        Ok(self
            .broker
            .get_provider_info(self.token, provider_id)?
            .description)
    }

    pub fn set_provider_offerings(
        &self,
        provider_id: ProviderId,
        offerings: Vec<LayerDependency>,
    ) -> Result<(), BrokerError> {
        self.broker
            .set_provider_offerings(self.token, provider_id, offerings)
    }

    pub fn set_subscriptions(&self, subscriptions: Vec<AssociatedLayer>) -> Result<(), BrokerError> {
        self.broker.set_subscriptions(self.token, subscriptions)
    }

    pub fn set_monitoring_enabled(&self, enabled: bool) -> Result<(), BrokerError> {
        self.broker.set_monitoring_enabled(self.token, enabled)?;
        self.monitoring.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    /// Publish a payload, through shared memory if it is large.
    pub fn publish_packet(
        &self,
        provider_id: ProviderId,
        layer: Layer,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        if payload.len() >= self.config.large_packet_threshold {
            let region = HeapSharedMemory::new(payload.to_vec());
            self.broker
                .publish_large_packet(self.token, provider_id, layer, Box::new(region))
        } else {
            self.broker
                .publish_packet(self.token, provider_id, layer, payload)
        }
    }

    /// Unregister from the broker. Later calls fail with an unknown client error.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.broker.unregister_client(self.token);
        }
    }
}

impl Drop for VmsClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
