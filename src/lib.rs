//! # Casper packet handler
//!
//! The packet-handling state machine of a Casper consensus node. The
//! [`PacketHandler`](components/packet_handler/struct.PacketHandler.html)
//! receives decoded peer-to-peer packets from the transport layer and routes
//! them to protocol logic according to the node's current lifecycle phase:
//! sequencing the one-time genesis ceremony among a committee of validators,
//! gating the bootstrap-to-participant transition on a network-approved
//! block, and driving block propagation, fork-choice responses and
//! doppelgänger detection once fully participating.
//!
//! The transport layer, block store, DAG storage, execution engine and the
//! consensus object itself are consumed through the collaborator traits in
//! [`network`], [`storage`], [`contract_runtime`] and [`consensus`].

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_qualifications
)]

pub mod components;
pub mod consensus;
pub mod contract_runtime;
pub mod crypto;
pub mod genesis;
pub mod network;
pub mod protocol;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod utils;
pub(crate) mod validation;

pub use components::packet_handler::{Config, Error, PacketHandler, Role};
pub use crypto::{
    asymmetric_key::{PublicKey, SecretKey, Signature, ValidatorIdentity},
    hash::Digest,
};
