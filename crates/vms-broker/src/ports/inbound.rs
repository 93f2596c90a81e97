//! Inbound Ports (Driving Ports)
//!
//! The operations a client can invoke on the broker.

use std::sync::Arc;
use vms_types::{
    AssociatedLayer, ClientToken, Layer, LayerDependency, ProviderId, ProviderInfo,
    RegistrationInfo,
};

use crate::error::BrokerError;
use crate::ports::outbound::{ClientCallback, SharedMemory};

/// Broker API (Driving Port)
///
/// Every operation except `register_client` and `unregister_client` fails
/// with a state error when `token` is not a live client.
pub trait VmsBrokerApi: Send + Sync {
    /// Register a client and start watching its liveness.
    ///
    /// Legacy clients skip provider ownership and offering checks.
    fn register_client(
        &self,
        token: ClientToken,
        callback: Arc<dyn ClientCallback>,
        legacy: bool,
    ) -> Result<RegistrationInfo, BrokerError>;

    /// Remove a client and everything it offered or subscribed to.
    ///
    /// Unknown tokens are ignored.
    fn unregister_client(&self, token: ClientToken);

    /// Get or assign the id for `info` and record the caller as its owner.
    fn register_provider(
        &self,
        token: ClientToken,
        info: ProviderInfo,
    ) -> Result<ProviderId, BrokerError>;

    /// Description registered for `provider_id`, or the empty info if the id
    /// was never assigned.
    fn get_provider_info(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
    ) -> Result<ProviderInfo, BrokerError>;

    /// Replace the caller's offering for `provider_id`.
    fn set_provider_offerings(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        dependencies: Vec<LayerDependency>,
    ) -> Result<(), BrokerError>;

    /// Replace the caller's subscriptions.
    fn set_subscriptions(
        &self,
        token: ClientToken,
        subscriptions: Vec<AssociatedLayer>,
    ) -> Result<(), BrokerError>;

    /// Monitoring clients receive every published packet.
    fn set_monitoring_enabled(&self, token: ClientToken, enabled: bool) -> Result<(), BrokerError>;

    /// Route an inline payload to every interested client.
    fn publish_packet(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        layer: Layer,
        payload: &[u8],
    ) -> Result<(), BrokerError>;

    /// Route a shared memory payload to every interested client.
    ///
    /// The region is closed before this returns, whatever the outcome.
    fn publish_large_packet(
        &self,
        token: ClientToken,
        provider_id: ProviderId,
        layer: Layer,
        packet: Box<dyn SharedMemory>,
    ) -> Result<(), BrokerError>;
}
