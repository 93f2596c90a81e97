//! # VMS Types Crate
//!
//! Data types shared between the Vehicle Map Service broker and its clients.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses the broker boundary
//!   is defined here.
//! - **Order-free equality**: collections inside snapshots are ordered sets,
//!   so two snapshots with the same content compare equal regardless of the
//!   order in which entries were supplied.
//! - **Value semantics**: layers, offerings and snapshots are plain values;
//!   clients receive owned copies and never observe broker internals.

pub mod client;
pub mod layers;
pub mod provider;
pub mod state;

pub use client::*;
pub use layers::*;
pub use provider::*;
pub use state::*;
