//! VMS Broker Service
//!
//! Orchestrates the domain components behind one coarse lock:
//! validate, mutate, recompute and snapshot all happen while the lock is
//! held; callbacks and statistics are delivered after it is released, using
//! the snapshots captured under the lock.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use vms_types::{
    AssociatedLayer, AvailableLayers, ClientToken, ConnectionState, Layer, LayerDependency,
    Offering, ProviderId, ProviderInfo, RegistrationInfo, SubscriptionState,
};

use crate::domain::{BrokerConfig, ClientSubscriptions};
use crate::error::{BrokerError, DeliveryError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ports::outbound::ClientReaper;
use crate::ports::{
    CallerIdentity, ClientCallback, DeathNotifier, SharedMemory, StatsService, VmsBrokerApi,
};
use crate::service::shared_memory_guard::SharedMemoryGuard;
use crate::service::state::{BrokerDump, BrokerState, ClientRecord};

/// VMS broker implementation
///
/// Cheap to clone; every clone shares the same state.
#[derive(Clone)]
pub struct VmsBrokerService {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    config: BrokerConfig,
    stats: Arc<dyn StatsService>,
    identity: Arc<dyn CallerIdentity>,
    state: Mutex<BrokerState>,
    metrics: Metrics,
}

impl VmsBrokerService {
    /// Create a broker with the default configuration
    pub fn new(stats: Arc<dyn StatsService>, identity: Arc<dyn CallerIdentity>) -> Self {
        Self::with_config(stats, identity, BrokerConfig::default())
    }

    /// Create with a custom configuration
    pub fn with_config(
        stats: Arc<dyn StatsService>,
        identity: Arc<dyn CallerIdentity>,
        config: BrokerConfig,
    ) -> Self {
        let state = BrokerState::new(config.sequence_policy);
        Self {
            inner: Arc::new(BrokerInner {
                config,
                stats,
                identity,
                state: Mutex::new(state),
                metrics: Metrics::new(),
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn available_layers(&self) -> AvailableLayers {
        self.inner.state.lock().available_layers.clone()
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.inner.state.lock().subscription_state.clone()
    }

    pub fn is_registered(&self, token: ClientToken) -> bool {
        self.inner.state.lock().clients.contains_key(&token)
    }

    pub fn client_count(&self) -> usize {
        self.inner.state.lock().clients.len()
    }

    /// Snapshot of the whole broker for diagnostics.
    pub fn dump(&self) -> BrokerDump {
        let metrics = self.inner.metrics.snapshot();
        self.inner.state.lock().dump(metrics)
    }

    pub fn dump_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.dump())
    }

    /// Validate the publisher, find recipients and deliver to each of them.
    fn route<F>(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        layer: &Layer,
        size: usize,
        deliver: F,
    ) -> Result<(), BrokerError>
    where
        F: Fn(&dyn ClientCallback) -> Result<(), DeliveryError>,
    {
        let (publisher_logger, recipients) = {
            let state = self.inner.state.lock();
            let publisher = state.client(token)?;
            if !publisher.may_publish(provider_id, layer) {
                warn!(%token, provider_id, %layer, "Rejected packet for layer that is not offered");
                return Err(BrokerError::UnknownOffering {
                    provider_id,
                    layer: *layer,
                });
            }

            let recipients: Vec<_> = state
                .clients
                .iter()
                .filter(|(_, client)| {
                    client.monitoring || client.subscriptions.matches(layer, provider_id)
                })
                .map(|(recipient, client)| {
                    (
                        *recipient,
                        Arc::clone(&client.callback),
                        Arc::clone(&client.logger),
                    )
                })
                .collect();

            (Arc::clone(&publisher.logger), recipients)
        };

        publisher_logger.log_packet_sent(layer, size);
        self.inner.metrics.record_published(recipients.len());

        if recipients.is_empty() {
            self.inner
                .stats
                .client_logger(self.inner.config.no_subscribers_process)
                .log_packet_dropped(layer, size);
            debug!(%token, provider_id, %layer, size, "No subscribers for packet");
            return Ok(());
        }

        debug!(%token, provider_id, %layer, size, recipients = recipients.len(), "Routing packet");
        for (recipient, callback, logger) in recipients {
            logger.log_packet_received(layer, size);
            if let Err(e) = deliver(callback.as_ref()) {
                self.inner.metrics.record_delivery_failure();
                warn!(token = %recipient, provider_id, %layer, error = %e, "Failed to deliver packet");
            }
        }

        Ok(())
    }
}

impl BrokerInner {
    /// Shared by explicit unregistration and process death.
    fn remove_client(&self, token: ClientToken, died: bool) {
        let (record, broadcast) = {
            let mut state = self.state.lock();
            let Some(record) = state.clients.remove(&token) else {
                match state.registering.get_mut(&token) {
                    Some(pending) if died => {
                        *pending = true;
                        debug!(%token, "Client died while registering");
                    }
                    _ => debug!(%token, died, "Ignoring removal of unknown client"),
                }
                return;
            };

            let available_layers = if record.offerings.is_empty() {
                None
            } else {
                state.refresh_available_layers()
            };
            let subscription_state = state.refresh_subscription_state();
            let broadcast = state.broadcast(available_layers, subscription_state);
            (record, broadcast)
        };

        record.watch.cancel();
        record.logger.log_connection_state(ConnectionState::Disconnected);
        self.metrics.record_removed(died);
        info!(%token, process = record.process, died, "Client removed");

        broadcast.deliver(&self.metrics);
    }
}

impl ClientReaper for BrokerInner {
    fn reap(&self, token: ClientToken) {
        self.remove_client(token, true);
    }
}

impl VmsBrokerApi for VmsBrokerService {
    fn register_client(
        &self,
        token: ClientToken,
        callback: Arc<dyn ClientCallback>,
        legacy: bool,
    ) -> Result<RegistrationInfo, BrokerError> {
        {
            let mut state = self.inner.state.lock();
            if state.clients.contains_key(&token) {
                debug!(%token, "Client already registered");
                return Ok(state.registration_info());
            }
            state.registering.entry(token).or_insert(false);
        }

        let process = self.inner.identity.calling_process();
        let logger = self.inner.stats.client_logger(process);
        logger.log_connection_state(ConnectionState::Connected);

        // Bound outside the lock; watch implementations may block
        let reaper = Arc::downgrade(&self.inner);
        let reaper: Weak<dyn ClientReaper> = reaper;
        let watch = match callback.watch_liveness(DeathNotifier::new(token, reaper)) {
            Ok(watch) => watch,
            Err(e) => {
                self.inner.state.lock().registering.remove(&token);
                logger.log_connection_state(ConnectionState::Disconnected);
                warn!(%token, process, error = %e, "Client died during registration");
                return Err(e.into());
            }
        };

        let mut state = self.inner.state.lock();
        let died = state.registering.remove(&token).unwrap_or(false);
        if state.clients.contains_key(&token) {
            // Lost a race with a concurrent registration of the same token
            let info = state.registration_info();
            drop(state);
            watch.cancel();
            return Ok(info);
        }

        state.clients.insert(
            token,
            ClientRecord::new(callback, Arc::clone(&logger), process, legacy, watch),
        );
        let info = state.registration_info();
        drop(state);

        self.inner.metrics.record_registered();
        info!(%token, process, legacy, "Client registered");

        if died {
            // The death notification arrived before the record existed
            self.inner.remove_client(token, true);
        }
        Ok(info)
    }

    fn unregister_client(&self, token: ClientToken) {
        self.inner.remove_client(token, false);
    }

    fn register_provider(
        &self,
        token: ClientToken,
        info: ProviderInfo,
    ) -> Result<ProviderId, BrokerError> {
        let mut state = self.inner.state.lock();
        state.client(token)?;

        let provider_id = state.providers.get_or_assign_id(&info);
        state.client_mut(token)?.owned_providers.insert(provider_id);

        debug!(%token, provider_id, "Provider registered");
        Ok(provider_id)
    }

    fn get_provider_info(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
    ) -> Result<ProviderInfo, BrokerError> {
        let state = self.inner.state.lock();
        state.client(token)?;
        Ok(state
            .providers
            .lookup(provider_id)
            .cloned()
            .unwrap_or_default())
    }

    fn set_provider_offerings(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        dependencies: Vec<LayerDependency>,
    ) -> Result<(), BrokerError> {
        let broadcast = {
            let mut state = self.inner.state.lock();
            let client = state.client_mut(token)?;
            if !client.may_offer(provider_id) {
                warn!(%token, provider_id, "Rejected offering for provider not owned by client");
                return Err(BrokerError::ProviderNotOwned { token, provider_id });
            }

            if dependencies.is_empty() {
                client.offerings.remove(&provider_id);
            } else {
                client
                    .offerings
                    .insert(provider_id, Offering::new(provider_id, dependencies));
            }
            debug!(%token, provider_id, "Provider offerings updated");

            let available_layers = state.refresh_available_layers();
            state.broadcast(available_layers, None)
        };

        broadcast.deliver(&self.inner.metrics);
        Ok(())
    }

    fn set_subscriptions(
        &self,
        token: ClientToken,
        subscriptions: Vec<AssociatedLayer>,
    ) -> Result<(), BrokerError> {
        let broadcast = {
            let mut state = self.inner.state.lock();
            let client = state.client_mut(token)?;
            client.subscriptions = ClientSubscriptions::from_entries(subscriptions);
            debug!(%token, "Client subscriptions updated");

            let subscription_state = state.refresh_subscription_state();
            state.broadcast(None, subscription_state)
        };

        broadcast.deliver(&self.inner.metrics);
        Ok(())
    }

    fn set_monitoring_enabled(&self, token: ClientToken, enabled: bool) -> Result<(), BrokerError> {
        let mut state = self.inner.state.lock();
        state.client_mut(token)?.monitoring = enabled;
        debug!(%token, enabled, "Monitoring toggled");
        Ok(())
    }

    fn publish_packet(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        layer: Layer,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.route(token, provider_id, &layer, payload.len(), |callback| {
            callback.on_packet_received(provider_id, &layer, payload)
        })
    }

    fn publish_large_packet(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        layer: Layer,
        packet: Box<dyn SharedMemory>,
    ) -> Result<(), BrokerError> {
        let packet = SharedMemoryGuard::new(packet);
        // Queried before the publisher is validated
        let size = packet.size();

        self.route(token, provider_id, &layer, size, |callback| {
            callback.on_large_packet_received(provider_id, &layer, packet.region())
        })
    }
}
