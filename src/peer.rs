//! Peer identity: opaque, process-unique tokens.
//!
//! Ids double as routing addresses and registry keys, so they must never be
//! reissued while any routing step could still reference a stale target.
//! The generator combines a random per-process prefix with a monotonic
//! counter: unique within the process for its whole lifetime, and unlikely
//! to collide with ids minted by a previous incarnation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier for one connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Mints fresh [`PeerId`]s, one per accepted connection.
pub struct PeerIdGenerator {
    prefix: u32,
    next: AtomicU64,
}

impl PeerIdGenerator {
    pub fn new() -> Self {
        Self {
            prefix: rand::random(),
            next: AtomicU64::new(1),
        }
    }

    /// Allocate an id that will not be reissued by this generator.
    pub fn next_id(&self) -> PeerId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        PeerId(format!("{:08x}-{:x}", self.prefix, n))
    }
}

impl Default for PeerIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
