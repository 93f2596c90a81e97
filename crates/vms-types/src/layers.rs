//! Layers, dependencies and offerings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::provider::ProviderId;

/// A typed, versioned category of map or sensor data.
///
/// The derived ordering (type, then subtype, then version) only exists to
/// keep snapshots deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Layer {
    pub layer_type: i32,
    pub subtype: i32,
    pub version: i32,
}

impl Layer {
    pub const fn new(layer_type: i32, subtype: i32, version: i32) -> Self {
        Self {
            layer_type,
            subtype,
            version,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.layer_type, self.subtype, self.version)
    }
}

/// A layer together with the layers that must be available before it can be.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerDependency {
    pub layer: Layer,
    pub dependencies: BTreeSet<Layer>,
}

impl LayerDependency {
    /// A layer with no prerequisites.
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_dependencies(layer: Layer, dependencies: impl IntoIterator<Item = Layer>) -> Self {
        Self {
            layer,
            dependencies: dependencies.into_iter().collect(),
        }
    }
}

/// Everything a single provider declares it can supply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub provider_id: ProviderId,
    pub dependencies: BTreeSet<LayerDependency>,
}

impl Offering {
    pub fn new(provider_id: ProviderId, dependencies: impl IntoIterator<Item = LayerDependency>) -> Self {
        Self {
            provider_id,
            dependencies: dependencies.into_iter().collect(),
        }
    }

    /// Whether `layer` is one of the layers this offering declares.
    pub fn offers(&self, layer: &Layer) -> bool {
        self.dependencies.iter().any(|dep| &dep.layer == layer)
    }
}

/// A layer associated with a set of providers.
///
/// Used both for availability (which providers can supply the layer) and for
/// subscriptions, where an empty provider set means "any provider".
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssociatedLayer {
    pub layer: Layer,
    pub provider_ids: BTreeSet<ProviderId>,
}

impl AssociatedLayer {
    pub fn new(layer: Layer, provider_ids: impl IntoIterator<Item = ProviderId>) -> Self {
        Self {
            layer,
            provider_ids: provider_ids.into_iter().collect(),
        }
    }

    /// A provider-agnostic subscription entry.
    pub fn layer_only(layer: Layer) -> Self {
        Self {
            layer,
            provider_ids: BTreeSet::new(),
        }
    }

    pub fn is_layer_only(&self) -> bool {
        self.provider_ids.is_empty()
    }
}
