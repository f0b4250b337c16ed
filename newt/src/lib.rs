//! A threaded CoAP endpoint runtime.
//!
//! An [`endpoint::Endpoint`] owns one UDP socket and acts symmetrically as
//! client and server: it acknowledges confirmable traffic, retransmits its
//! own confirmable messages with exponential back-off, routes requests to
//! [`resource::Resource`]s by Uri-Path, and fragments / reassembles large
//! payloads block-wise ([`block`]).
//!
//! Message data structures and the wire codec live in the `newt-msg` crate;
//! everything here is about moving those messages reliably.

#![deny(unsafe_code)]

/// Runtime configuration
pub mod config;

/// Monotonic clocks & stopwatches
pub mod time;

/// Sockets & addressed data
pub mod net;

/// Exchange identity tuples
pub mod ident;

/// Reply templates
pub mod template;

/// Runtime errors
pub mod error;

/// In-flight confirmable messages & retransmission
pub mod transaction;

/// Resources & routing
pub mod resource;

/// Worker threads
pub mod worker;

/// The endpoint aggregate
pub mod endpoint;

/// Block-wise transfer: splitting & reassembly
pub mod block;

/// Zip archive helpers for directory transfers
pub mod archive;

#[cfg(test)]
pub(crate) mod test;

pub use error::Error;
