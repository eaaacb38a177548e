//! Peer registry and envelope router.
//!
//! One logical task per connection; the registry is the single shared
//! resource. Mutations (insert/remove) and full-registry iterations
//! (broadcast fan-out, arrival/departure notifications) are serialized
//! behind an async `RwLock`; per-peer deliveries go through unbounded mpsc
//! channels and never block the router.
//!
//! All failures are contained at the single-connection boundary: a closed
//! outbound channel is logged and skipped, never propagated to the sender
//! or to other recipients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::envelope::{Envelope, BROADCAST};
use crate::peer::{PeerId, PeerIdGenerator};

/// Outbound channel to one peer's session task.
pub type PeerSender = mpsc::UnboundedSender<Envelope>;

/// Registry entry for one live connection.
struct PeerEntry {
    sender: PeerSender,
}

/// Statistics about registry state (returned as a snapshot from atomic counters)
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub peers_connected: usize,
    pub envelopes_routed: u64,
    pub envelopes_broadcast: u64,
    pub envelopes_dropped: u64,
}

/// Internal atomic counters for lock-free stats tracking
struct AtomicRegistryStats {
    peers_connected: AtomicUsize,
    envelopes_routed: AtomicU64,
    envelopes_broadcast: AtomicU64,
    envelopes_dropped: AtomicU64,
}

impl AtomicRegistryStats {
    fn new() -> Self {
        Self {
            peers_connected: AtomicUsize::new(0),
            envelopes_routed: AtomicU64::new(0),
            envelopes_broadcast: AtomicU64::new(0),
            envelopes_dropped: AtomicU64::new(0),
        }
    }

    /// Read all atomics and return a plain RegistryStats snapshot
    fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            peers_connected: self.peers_connected.load(Ordering::Relaxed),
            envelopes_routed: self.envelopes_routed.load(Ordering::Relaxed),
            envelopes_broadcast: self.envelopes_broadcast.load(Ordering::Relaxed),
            envelopes_dropped: self.envelopes_dropped.load(Ordering::Relaxed),
        }
    }
}

struct RegistryInner {
    /// Connected peers, keyed by their routing address
    peers: RwLock<HashMap<PeerId, PeerEntry>>,
    /// Id allocator; ids are never reused within the process lifetime
    ids: PeerIdGenerator,
    /// Lock-free atomic stats
    stats: AtomicRegistryStats,
}

/// Read-side handle to the registry for stats and peer listings.
#[derive(Clone)]
pub struct RegistryHandle {
    inner: Arc<RegistryInner>,
}

impl RegistryHandle {
    /// Get current registry statistics
    pub fn stats(&self) -> RegistryStats {
        self.inner.stats.snapshot()
    }

    /// Get the ids of all currently registered peers
    pub async fn peer_ids(&self) -> Vec<PeerId> {
        self.inner.peers.read().await.keys().cloned().collect()
    }

    /// True if `id` is currently registered
    pub async fn is_registered(&self, id: &PeerId) -> bool {
        self.inner.peers.read().await.contains_key(id)
    }
}

/// Result of registering a new connection.
pub struct Registration {
    /// The fresh id assigned to the connection; its sending identity for
    /// the remainder of its session.
    pub id: PeerId,
    /// Snapshot of the peers already registered when this one joined.
    pub peers: Vec<PeerId>,
}

/// Outcome of one routing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Envelope reached this many recipients (1 for targeted, n for broadcast).
    Delivered(usize),
    /// Destination unknown or already gone; envelope silently dropped.
    NoRecipient,
}

/// Peer registry and envelope router.
///
/// Owned by the server process and passed explicitly to each per-connection
/// task; cloning is cheap and shares the same underlying state.
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                peers: RwLock::new(HashMap::new()),
                ids: PeerIdGenerator::new(),
                stats: AtomicRegistryStats::new(),
            }),
        }
    }

    /// Get a read-side handle for stats and peer listings
    pub fn handle(&self) -> RegistryHandle {
        RegistryHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Register a newly accepted connection.
    ///
    /// Allocates a fresh id, inserts the connection, then sends a `new-peer`
    /// notification to every other registered peer. Notifications go out
    /// after insertion, so an envelope addressed to the new id by a racing
    /// peer can still arrive before that peer saw the notification; the
    /// window is inherent to this ordering and left open.
    pub async fn register(&self, sender: PeerSender) -> Registration {
        let id = self.inner.ids.next_id();
        let mut peers = self.inner.peers.write().await;

        let existing: Vec<PeerId> = peers.keys().cloned().collect();
        peers.insert(id.clone(), PeerEntry { sender });
        self.inner
            .stats
            .peers_connected
            .fetch_add(1, Ordering::Relaxed);

        let note = Envelope::new_peer(&id);
        for (peer_id, entry) in peers.iter() {
            if *peer_id == id {
                continue;
            }
            if entry.sender.send(note.clone()).is_err() {
                debug!(peer = %peer_id, "Skipping new-peer notification: channel closed");
            }
        }

        info!(peer = %id, peers = peers.len(), "Peer registered");
        Registration { id, peers: existing }
    }

    /// Route one envelope from a registered sender.
    ///
    /// `from` is overwritten with the sender's id unconditionally, regardless
    /// of any client-supplied value. `to == "all"` fans out to every peer
    /// except the sender; each delivery is independent and a failed one does
    /// not abort the rest. A named destination receives the envelope exactly
    /// once if registered; otherwise the envelope is silently dropped.
    ///
    /// Errors only on a structurally invalid envelope (missing `to`), which
    /// the caller treats as fatal to the sending session.
    pub async fn route(&self, sender_id: &PeerId, mut envelope: Envelope) -> Result<Delivery> {
        envelope.from = Some(sender_id.clone());

        let Some(to) = envelope.to.clone() else {
            bail!("envelope from {sender_id} has no `to` field");
        };

        self.inner
            .stats
            .envelopes_routed
            .fetch_add(1, Ordering::Relaxed);

        let peers = self.inner.peers.read().await;

        if to == BROADCAST {
            let mut delivered = 0;
            for (peer_id, entry) in peers.iter() {
                if peer_id == sender_id {
                    continue;
                }
                if entry.sender.send(envelope.clone()).is_err() {
                    warn!(peer = %peer_id, "Broadcast delivery failed: channel closed");
                } else {
                    delivered += 1;
                }
            }
            self.inner
                .stats
                .envelopes_broadcast
                .fetch_add(1, Ordering::Relaxed);
            debug!(from = %sender_id, delivered, "Envelope broadcast");
            return Ok(Delivery::Delivered(delivered));
        }

        match peers.get(&PeerId::from(to.as_str())) {
            Some(entry) => {
                if entry.sender.send(envelope).is_err() {
                    // Recipient's task is tearing down; treat like an
                    // unknown destination and let its own cleanup run.
                    warn!(from = %sender_id, to = %to, "Targeted delivery failed: channel closed");
                    self.inner
                        .stats
                        .envelopes_dropped
                        .fetch_add(1, Ordering::Relaxed);
                    Ok(Delivery::NoRecipient)
                } else {
                    debug!(from = %sender_id, to = %to, "Envelope delivered");
                    Ok(Delivery::Delivered(1))
                }
            }
            None => {
                self.inner
                    .stats
                    .envelopes_dropped
                    .fetch_add(1, Ordering::Relaxed);
                debug!(from = %sender_id, to = %to, "Dropping envelope: unknown destination");
                Ok(Delivery::NoRecipient)
            }
        }
    }

    /// Unregister a connection. Idempotent: removing an absent id is a no-op.
    ///
    /// After removal, the remaining peers receive a `peer-gone` notification
    /// so they can drop their side of any session with the departed peer.
    pub async fn unregister(&self, id: &PeerId) {
        let mut peers = self.inner.peers.write().await;

        if peers.remove(id).is_none() {
            debug!(peer = %id, "Skipping unregister: not registered");
            return;
        }
        self.inner
            .stats
            .peers_connected
            .fetch_sub(1, Ordering::Relaxed);

        let note = Envelope::peer_gone(id);
        for (peer_id, entry) in peers.iter() {
            if entry.sender.send(note.clone()).is_err() {
                debug!(peer = %peer_id, "Skipping peer-gone notification: channel closed");
            }
        }

        info!(peer = %id, peers = peers.len(), "Peer unregistered");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
