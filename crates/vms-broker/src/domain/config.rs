//! Broker and client configuration
//!
//! # Example
//!
//! ```ignore
//! use vms_broker::domain::{BrokerConfig, SequencePolicy};
//!
//! let config = BrokerConfig::default().with_sequence_policy(SequencePolicy::OnChange);
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use vms_types::{ProcessId, NO_SUBSCRIBERS_PROCESS};

use crate::error::ConfigError;

/// When the availability and subscription sequence numbers advance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequencePolicy {
    /// Every update advances the sequence and is broadcast, even if the
    /// recomputed state is unchanged.
    #[default]
    EveryUpdate,
    /// Only updates that change the recomputed state advance the sequence
    /// and are broadcast.
    OnChange,
}

impl FromStr for SequencePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "every-update" | "every_update" => Ok(Self::EveryUpdate),
            "on-change" | "on_change" => Ok(Self::OnChange),
            other => Err(ConfigError::InvalidValue {
                key: "sequence_policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Broker configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// When sequence numbers advance
    pub sequence_policy: SequencePolicy,
    /// Process key that receives "dropped" statistics for packets nobody
    /// was subscribed to
    pub no_subscribers_process: ProcessId,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            sequence_policy: SequencePolicy::EveryUpdate,
            no_subscribers_process: NO_SUBSCRIBERS_PROCESS,
        }
    }
}

impl BrokerConfig {
    /// Read overrides from the environment.
    ///
    /// - `VMS_SEQUENCE_POLICY`: `every-update` (default) or `on-change`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(policy) = lookup("VMS_SEQUENCE_POLICY") {
            config.sequence_policy = policy.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Real process ids are non-negative; the sentinel must not collide
        if self.no_subscribers_process >= 0 {
            return Err(ConfigError::InvalidParameters(format!(
                "no_subscribers_process must be negative, got {}",
                self.no_subscribers_process
            )));
        }
        Ok(())
    }

    /// Builder-style method to set the sequence policy
    pub fn with_sequence_policy(mut self, policy: SequencePolicy) -> Self {
        self.sequence_policy = policy;
        self
    }

    /// Builder-style method to set the no-subscribers process key
    pub fn with_no_subscribers_process(mut self, process: ProcessId) -> Self {
        self.no_subscribers_process = process;
        self
    }
}

/// Payloads at or above this size take the shared memory path by default
pub const DEFAULT_LARGE_PACKET_THRESHOLD: usize = 16 * 1024;

/// In-process client configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub large_packet_threshold: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            large_packet_threshold: DEFAULT_LARGE_PACKET_THRESHOLD,
        }
    }
}

impl ClientConfig {
    /// Read overrides from the environment.
    ///
    /// - `VMS_LARGE_PACKET_THRESHOLD`: size in bytes (default: 16384)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("VMS_LARGE_PACKET_THRESHOLD") {
            config.large_packet_threshold =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "large_packet_threshold".to_string(),
                    value: raw.clone(),
                })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.large_packet_threshold == 0 {
            return Err(ConfigError::InvalidParameters(
                "large_packet_threshold cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder-style method to set the large packet threshold
    pub fn with_large_packet_threshold(mut self, bytes: usize) -> Self {
        self.large_packet_threshold = bytes;
        self
    }
}
