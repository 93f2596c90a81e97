//! Service layer for the VMS broker
//!
//! Wires the domain components to the ports behind a single lock.

mod broker_service;
pub(crate) mod shared_memory_guard;
pub(crate) mod state;

pub use broker_service::VmsBrokerService;
pub use state::{BrokerDump, ClientDump};
