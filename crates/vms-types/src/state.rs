//! Sequence-numbered state snapshots broadcast by the broker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::layers::{AssociatedLayer, Layer};

/// Which layers are currently available and from which providers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableLayers {
    pub sequence: u64,
    pub associated_layers: BTreeSet<AssociatedLayer>,
}

impl AvailableLayers {
    pub fn new(sequence: u64, associated_layers: impl IntoIterator<Item = AssociatedLayer>) -> Self {
        Self {
            sequence,
            associated_layers: associated_layers.into_iter().collect(),
        }
    }

    /// Whether any provider currently supplies `layer`.
    pub fn contains_layer(&self, layer: &Layer) -> bool {
        self.associated_layers.iter().any(|entry| &entry.layer == layer)
    }
}

/// What publishers should be producing, aggregated over every live client.
///
/// `layers` holds provider-agnostic subscriptions. `associated_layers` holds
/// provider-specific subscriptions for layers that are not in `layers`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    pub sequence: u64,
    pub layers: BTreeSet<Layer>,
    pub associated_layers: BTreeSet<AssociatedLayer>,
}

impl SubscriptionState {
    pub fn new(
        sequence: u64,
        layers: impl IntoIterator<Item = Layer>,
        associated_layers: impl IntoIterator<Item = AssociatedLayer>,
    ) -> Self {
        Self {
            sequence,
            layers: layers.into_iter().collect(),
            associated_layers: associated_layers.into_iter().collect(),
        }
    }

    /// Same subscriptions, ignoring the sequence number.
    pub fn same_content(&self, other: &Self) -> bool {
        self.layers == other.layers && self.associated_layers == other.associated_layers
    }
}

/// Snapshot handed back to a client when it registers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub available_layers: AvailableLayers,
    pub subscription_state: SubscriptionState,
}
