//! Error types for the VMS broker

use thiserror::Error;
use vms_types::{ClientToken, Layer, ProviderId};

/// Broad classification of a broker failure.
///
/// State errors mean the caller is not in a position to make the call at all.
/// Argument errors mean the call referenced something the caller may not use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    State,
    Argument,
}

/// Errors returned by broker operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Unknown client: {0}")]
    UnknownClient(ClientToken),

    #[error("Failed to watch client liveness: {0}")]
    LivenessWatchFailed(#[from] LinkError),

    #[error("Provider {provider_id} is not owned by client {token}")]
    ProviderNotOwned {
        token: ClientToken,
        provider_id: ProviderId,
    },

    #[error("Provider {provider_id} has no offering for layer {layer}")]
    UnknownOffering { provider_id: ProviderId, layer: Layer },
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownClient(_) | Self::LivenessWatchFailed(_) => ErrorKind::State,
            Self::ProviderNotOwned { .. } | Self::UnknownOffering { .. } => ErrorKind::Argument,
        }
    }

    pub fn is_state_error(&self) -> bool {
        self.kind() == ErrorKind::State
    }

    pub fn is_argument_error(&self) -> bool {
        self.kind() == ErrorKind::Argument
    }
}

/// Failure to establish a liveness watch on a client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Client is already dead")]
    ClientDead,

    #[error("Liveness watch unavailable: {0}")]
    Unavailable(String),
}

/// Failure to deliver a callback to a client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Client is gone")]
    ClientGone,

    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Errors from shared memory regions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedMemoryError {
    #[error("Shared memory region is closed")]
    Closed,

    #[error("Shared memory region is unreadable: {0}")]
    Unreadable(String),
}

/// Invalid broker or client configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidParameters(String),
}
