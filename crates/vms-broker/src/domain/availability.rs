//! Layer availability resolution.
//!
//! A layer offered by a provider is available once every layer it depends on
//! is available from at least one provider. Resolution is a monotonic
//! fixpoint over the union of all offerings:
//!
//! 1. Flatten offerings into `(provider, layer, required layers)` entries.
//! 2. Sweep the unresolved entries, resolving each one whose required layers
//!    are all already available.
//! 3. Stop after a sweep that resolves nothing.
//!
//! Layers that depend on themselves, directly or through a cycle, are never
//! made available unless some other entry breaks the cycle.

use std::collections::{BTreeMap, BTreeSet};
use vms_types::{AssociatedLayer, Layer, Offering, ProviderId};

/// Stateless resolver; see the module docs for the algorithm.
pub struct LayerAvailabilityResolver;

struct Entry<'a> {
    provider_id: ProviderId,
    layer: &'a Layer,
    required: &'a BTreeSet<Layer>,
}

impl LayerAvailabilityResolver {
    /// Compute the available layers and the providers able to supply each.
    ///
    /// Every returned entry has a non-empty provider set.
    pub fn resolve<'a>(offerings: impl IntoIterator<Item = &'a Offering>) -> BTreeSet<AssociatedLayer> {
        let mut pending: Vec<Entry<'a>> = offerings
            .into_iter()
            .flat_map(|offering| {
                offering.dependencies.iter().map(move |dep| Entry {
                    provider_id: offering.provider_id,
                    layer: &dep.layer,
                    required: &dep.dependencies,
                })
            })
            .collect();

        let mut available: BTreeMap<Layer, BTreeSet<ProviderId>> = BTreeMap::new();

        loop {
            let before = pending.len();
            let mut unresolved = Vec::with_capacity(before);

            for entry in pending {
                if entry.required.iter().all(|layer| available.contains_key(layer)) {
                    available
                        .entry(*entry.layer)
                        .or_default()
                        .insert(entry.provider_id);
                } else {
                    unresolved.push(entry);
                }
            }

            if unresolved.len() == before {
                break;
            }
            pending = unresolved;
        }

        available
            .into_iter()
            .map(|(layer, provider_ids)| AssociatedLayer { layer, provider_ids })
            .collect()
    }
}
