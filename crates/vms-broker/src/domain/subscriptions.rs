//! Per-client subscriptions and their global merge.
//!
//! A client subscribes either to a whole layer (any provider) or to a layer
//! from specific providers. A whole-layer subscription masks provider-specific
//! subscriptions to the same layer, both within one client and across all
//! clients when merged.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use vms_types::{AssociatedLayer, Layer, ProviderId};

/// The subscriptions held by one client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClientSubscriptions {
    layers: BTreeSet<Layer>,
    provider_layers: BTreeMap<Layer, BTreeSet<ProviderId>>,
}

impl ClientSubscriptions {
    /// Build from the entries of one `set_subscriptions` call.
    ///
    /// Entries with an empty provider set are whole-layer subscriptions.
    /// Provider-specific entries for the same layer are merged.
    pub fn from_entries(entries: impl IntoIterator<Item = AssociatedLayer>) -> Self {
        let mut layers = BTreeSet::new();
        let mut provider_layers: BTreeMap<Layer, BTreeSet<ProviderId>> = BTreeMap::new();

        for entry in entries {
            if entry.is_layer_only() {
                layers.insert(entry.layer);
            } else {
                provider_layers
                    .entry(entry.layer)
                    .or_default()
                    .extend(entry.provider_ids);
            }
        }

        provider_layers.retain(|layer, _| !layers.contains(layer));

        Self {
            layers,
            provider_layers,
        }
    }

    /// Whether a packet for `layer` from `provider_id` should reach this client.
    pub fn matches(&self, layer: &Layer, provider_id: ProviderId) -> bool {
        self.layers.contains(layer)
            || self
                .provider_layers
                .get(layer)
                .is_some_and(|providers| providers.contains(&provider_id))
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.provider_layers.is_empty()
    }

    pub fn layers(&self) -> &BTreeSet<Layer> {
        &self.layers
    }

    pub fn provider_layers(&self) -> &BTreeMap<Layer, BTreeSet<ProviderId>> {
        &self.provider_layers
    }
}

/// Subscriptions of every live client merged into one view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedSubscriptions {
    pub layers: BTreeSet<Layer>,
    pub associated_layers: BTreeSet<AssociatedLayer>,
}

/// Merge per-client subscriptions.
///
/// Whole-layer subscriptions are unioned. Provider sets for the same layer are
/// unioned across clients, then dropped if any client subscribed to the whole
/// layer.
pub fn merge_subscriptions<'a>(
    clients: impl IntoIterator<Item = &'a ClientSubscriptions>,
) -> MergedSubscriptions {
    let mut layers = BTreeSet::new();
    let mut provider_layers: BTreeMap<Layer, BTreeSet<ProviderId>> = BTreeMap::new();

    for client in clients {
        layers.extend(client.layers.iter().copied());
        for (layer, providers) in &client.provider_layers {
            provider_layers
                .entry(*layer)
                .or_default()
                .extend(providers.iter().copied());
        }
    }

    let associated_layers = provider_layers
        .into_iter()
        .filter(|(layer, _)| !layers.contains(layer))
        .map(|(layer, provider_ids)| AssociatedLayer { layer, provider_ids })
        .collect();

    MergedSubscriptions {
        layers,
        associated_layers,
    }
}
