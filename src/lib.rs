//! Yamabiko - WebRTC signaling relay with camera preview streaming
//!
//! Two independent services in one process:
//!
//! - **Signaling relay**: peers connect over WebSocket, receive a unique id,
//!   learn about each other, and exchange arbitrary JSON envelopes (WebRTC
//!   offer/answer/ICE bootstrap), routed either to one named peer or
//!   broadcast to all others.
//! - **Camera preview**: a basic-auth-gated HTTP endpoint streaming JPEG
//!   frames as a `multipart/x-mixed-replace` body.
//!
//! # Example - Server
//!
//! ```ignore
//! use yamabiko::server::Registry;
//!
//! let registry = Registry::new();
//! yamabiko::web::start(registry, "0.0.0.0:7860".parse()?, None, None, None).await?;
//! ```

// Wire message unit: `to`/`from` plus opaque payload
mod envelope;

// Process-unique peer identifiers
mod peer;

// Camera frame sources feeding a broadcast channel
pub mod capture;

// Peer registry and envelope router
pub mod server;

// Axum HTTP server, WebSocket sessions, MJPEG endpoint
pub mod web;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use envelope::{Envelope, BROADCAST};
pub use peer::{PeerId, PeerIdGenerator};
