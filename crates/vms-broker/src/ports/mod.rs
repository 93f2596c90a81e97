//! Ports (trait definitions) for the VMS broker
//!
//! - `inbound`: the API the broker offers to clients
//! - `outbound`: capabilities the broker needs from its environment

pub mod inbound;
pub mod outbound;

pub use inbound::VmsBrokerApi;
pub use outbound::{
    CallerIdentity, ClientCallback, ClientLogger, DeathNotifier, LivenessWatch, SharedMemory,
    StatsService,
};
