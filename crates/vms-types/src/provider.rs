//! Provider identity.

use serde::{Deserialize, Serialize};

/// Broker-assigned provider identifier. Ids start at 1 and are never reused.
pub type ProviderId = u32;

/// Opaque description of a data provider.
///
/// Two infos with the same bytes describe the same provider and are assigned
/// the same id. The default value carries no description and is what the
/// broker returns for ids it has never assigned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub description: Option<Vec<u8>>,
}

impl ProviderInfo {
    pub fn new(description: impl Into<Vec<u8>>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none()
    }
}
