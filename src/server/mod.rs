//! Signaling server core.
//!
//! The registry is the authoritative in-memory set of connected peers and
//! the router that moves envelopes between them:
//! - Registers each accepted connection under a fresh unique id
//! - Notifies existing peers of arrivals and departures
//! - Forwards each inbound envelope to one named peer or broadcasts it to
//!   all others, best-effort, at most one hop

mod registry;

pub use registry::{Delivery, PeerSender, Registration, Registry, RegistryHandle, RegistryStats};
