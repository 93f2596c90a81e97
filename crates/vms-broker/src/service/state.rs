//! Broker state guarded by the service lock, and the snapshots delivered
//! after the lock is released.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use vms_types::{
    AvailableLayers, ClientToken, Layer, Offering, ProcessId, ProviderId, RegistrationInfo,
    SubscriptionState,
};

use crate::domain::{
    merge_subscriptions, ClientSubscriptions, LayerAvailabilityResolver, ProviderRegistry,
    SequencePolicy,
};
use crate::error::BrokerError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ports::{ClientCallback, ClientLogger, LivenessWatch};

/// One live client.
pub(crate) struct ClientRecord {
    pub callback: Arc<dyn ClientCallback>,
    pub logger: Arc<dyn ClientLogger>,
    pub process: ProcessId,
    pub legacy: bool,
    pub monitoring: bool,
    pub owned_providers: BTreeSet<ProviderId>,
    /// Only non-empty offerings are kept
    pub offerings: BTreeMap<ProviderId, Offering>,
    pub subscriptions: ClientSubscriptions,
    pub watch: Box<dyn LivenessWatch>,
}

impl ClientRecord {
    pub fn new(
        callback: Arc<dyn ClientCallback>,
        logger: Arc<dyn ClientLogger>,
        process: ProcessId,
        legacy: bool,
        watch: Box<dyn LivenessWatch>,
    ) -> Self {
        Self {
            callback,
            logger,
            process,
            legacy,
            monitoring: false,
            owned_providers: BTreeSet::new(),
            offerings: BTreeMap::new(),
            subscriptions: ClientSubscriptions::default(),
            watch,
        }
    }

    pub fn may_offer(&self, provider_id: ProviderId) -> bool {
        self.legacy || self.owned_providers.contains(&provider_id)
    }

    pub fn may_publish(&self, provider_id: ProviderId, layer: &Layer) -> bool {
        self.legacy
            || self
                .offerings
                .get(&provider_id)
                .is_some_and(|offering| offering.offers(layer))
    }
}

pub(crate) struct BrokerState {
    pub clients: BTreeMap<ClientToken, ClientRecord>,
    /// Tokens whose liveness watch is being bound, and whether they died meanwhile
    pub registering: HashMap<ClientToken, bool>,
    pub providers: ProviderRegistry,
    pub available_layers: AvailableLayers,
    pub subscription_state: SubscriptionState,
    policy: SequencePolicy,
}

impl BrokerState {
    pub fn new(policy: SequencePolicy) -> Self {
        Self {
            clients: BTreeMap::new(),
            registering: HashMap::new(),
            providers: ProviderRegistry::new(),
            available_layers: AvailableLayers::default(),
            subscription_state: SubscriptionState::default(),
            policy,
        }
    }

    pub fn client(&self, token: ClientToken) -> Result<&ClientRecord, BrokerError> {
        self.clients
            .get(&token)
            .ok_or(BrokerError::UnknownClient(token))
    }

    pub fn client_mut(&mut self, token: ClientToken) -> Result<&mut ClientRecord, BrokerError> {
        self.clients
            .get_mut(&token)
            .ok_or(BrokerError::UnknownClient(token))
    }

    pub fn registration_info(&self) -> RegistrationInfo {
        RegistrationInfo {
            available_layers: self.available_layers.clone(),
            subscription_state: self.subscription_state.clone(),
        }
    }

    /// Recompute availability from every client's offerings.
    ///
    /// Returns the new snapshot if the sequence advanced.
    pub fn refresh_available_layers(&mut self) -> Option<AvailableLayers> {
        let resolved = LayerAvailabilityResolver::resolve(
            self.clients
                .values()
                .flat_map(|client| client.offerings.values()),
        );

        if self.policy == SequencePolicy::OnChange
            && resolved == self.available_layers.associated_layers
        {
            return None;
        }

        self.available_layers = AvailableLayers {
            sequence: self.available_layers.sequence + 1,
            associated_layers: resolved,
        };
        debug!(
            sequence = self.available_layers.sequence,
            layers = self.available_layers.associated_layers.len(),
            "Layer availability updated"
        );
        Some(self.available_layers.clone())
    }

    /// Recompute the global subscription state from every client.
    ///
    /// Returns the new snapshot if the sequence advanced.
    pub fn refresh_subscription_state(&mut self) -> Option<SubscriptionState> {
        let merged = merge_subscriptions(self.clients.values().map(|client| &client.subscriptions));

        if self.policy == SequencePolicy::OnChange
            && merged.layers == self.subscription_state.layers
            && merged.associated_layers == self.subscription_state.associated_layers
        {
            return None;
        }

        self.subscription_state = SubscriptionState {
            sequence: self.subscription_state.sequence + 1,
            layers: merged.layers,
            associated_layers: merged.associated_layers,
        };
        debug!(
            sequence = self.subscription_state.sequence,
            layers = self.subscription_state.layers.len(),
            associated_layers = self.subscription_state.associated_layers.len(),
            "Subscription state updated"
        );
        Some(self.subscription_state.clone())
    }

    /// Capture what must be sent to every live client once the lock is gone.
    pub fn broadcast(
        &self,
        available_layers: Option<AvailableLayers>,
        subscription_state: Option<SubscriptionState>,
    ) -> Broadcast {
        let callbacks = if available_layers.is_some() || subscription_state.is_some() {
            self.clients
                .iter()
                .map(|(token, client)| (*token, Arc::clone(&client.callback)))
                .collect()
        } else {
            Vec::new()
        };

        Broadcast {
            callbacks,
            available_layers,
            subscription_state,
        }
    }

    pub fn dump(&self, metrics: MetricsSnapshot) -> BrokerDump {
        BrokerDump {
            available_layers: self.available_layers.clone(),
            subscription_state: self.subscription_state.clone(),
            provider_count: self.providers.len(),
            clients: self
                .clients
                .iter()
                .map(|(token, client)| ClientDump {
                    token: *token,
                    process: client.process,
                    legacy: client.legacy,
                    monitoring: client.monitoring,
                    owned_providers: client.owned_providers.clone(),
                    offerings: client.offerings.values().cloned().collect(),
                    subscriptions: client.subscriptions.clone(),
                })
                .collect(),
            metrics,
        }
    }
}

/// State snapshots waiting to be delivered outside the lock.
#[must_use]
pub(crate) struct Broadcast {
    callbacks: Vec<(ClientToken, Arc<dyn ClientCallback>)>,
    available_layers: Option<AvailableLayers>,
    subscription_state: Option<SubscriptionState>,
}

impl Broadcast {
    pub fn deliver(self, metrics: &Metrics) {
        if let Some(layers) = &self.available_layers {
            metrics.record_availability_update();
            for (token, callback) in &self.callbacks {
                if let Err(e) = callback.on_layer_availability_changed(layers) {
                    metrics.record_delivery_failure();
                    warn!(%token, sequence = layers.sequence, error = %e, "Failed to deliver layer availability");
                }
            }
        }

        if let Some(state) = &self.subscription_state {
            metrics.record_subscription_update();
            for (token, callback) in &self.callbacks {
                if let Err(e) = callback.on_subscription_state_changed(state) {
                    metrics.record_delivery_failure();
                    warn!(%token, sequence = state.sequence, error = %e, "Failed to deliver subscription state");
                }
            }
        }
    }
}

/// Serializable view of the whole broker, for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct BrokerDump {
    pub available_layers: AvailableLayers,
    pub subscription_state: SubscriptionState,
    pub provider_count: usize,
    pub clients: Vec<ClientDump>,
    pub metrics: MetricsSnapshot,
}

/// Serializable view of one client.
#[derive(Clone, Debug, Serialize)]
pub struct ClientDump {
    pub token: ClientToken,
    pub process: ProcessId,
    pub legacy: bool,
    pub monitoring: bool,
    pub owned_providers: BTreeSet<ProviderId>,
    pub offerings: Vec<Offering>,
    pub subscriptions: ClientSubscriptions,
}
