//! Content-addressed provider registry.
//!
//! Every distinct [`ProviderInfo`] gets exactly one id for the lifetime of the
//! broker. Ids start at 1, increase by one per new description and are never
//! reused or removed.

use std::collections::HashMap;
use vms_types::{ProviderId, ProviderInfo};

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    ids: HashMap<ProviderInfo, ProviderId>,
    /// Index `n` holds the info for id `n + 1`
    infos: Vec<ProviderInfo>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id already assigned to `info`, or assign the next one.
    pub fn get_or_assign_id(&mut self, info: &ProviderInfo) -> ProviderId {
        if let Some(id) = self.ids.get(info) {
            return *id;
        }

        self.infos.push(info.clone());
        let id = self.infos.len() as ProviderId;
        self.ids.insert(info.clone(), id);
        id
    }

    pub fn lookup(&self, id: ProviderId) -> Option<&ProviderInfo> {
        let index = (id as usize).checked_sub(1)?;
        self.infos.get(index)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
