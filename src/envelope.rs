//! Signaling envelope: the unit of exchange between peers.
//!
//! Wire shape (one JSON object per WebSocket text frame):
//!
//! ```json
//! { "to": "<peer-id>" | "all", "from": "<peer-id>", ...arbitrary fields }
//! ```
//!
//! The router only interprets `to` and `from`; everything else is carried
//! verbatim through the flattened `rest` map. Inbound `from` is never
//! trusted: the router overwrites it with the sending connection's id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::peer::PeerId;

/// Reserved destination meaning "every peer except the sender".
pub const BROADCAST: &str = "all";

/// One routed message unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Destination selector: a peer id, [`BROADCAST`], or absent.
    ///
    /// Absent `to` on an inbound envelope is a protocol violation and
    /// tears down the sending session. Server-originated notifications
    /// carry no `to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Sender's id. Set by the router on every forwarded envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<PeerId>,

    /// Opaque payload fields, forwarded untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Envelope {
    /// Notification to pre-existing peers that a new peer registered.
    pub fn new_peer(id: &PeerId) -> Self {
        let mut rest = Map::new();
        rest.insert("type".into(), Value::String("new-peer".into()));
        Self {
            to: None,
            from: Some(id.clone()),
            rest,
        }
    }

    /// Notification to remaining peers that a peer unregistered.
    pub fn peer_gone(id: &PeerId) -> Self {
        let mut rest = Map::new();
        rest.insert("type".into(), Value::String("peer-gone".into()));
        Self {
            to: None,
            from: Some(id.clone()),
            rest,
        }
    }

    /// Welcome envelope for a freshly registered peer: its own id plus the
    /// ids of the peers already present when it joined.
    pub fn peer_list(own: &PeerId, peers: &[PeerId]) -> Self {
        let mut rest = Map::new();
        rest.insert("type".into(), Value::String("peers".into()));
        rest.insert("you".into(), Value::String(own.to_string()));
        rest.insert(
            "peers".into(),
            Value::Array(
                peers
                    .iter()
                    .map(|p| Value::String(p.to_string()))
                    .collect(),
            ),
        );
        Self {
            to: None,
            from: None,
            rest,
        }
    }

    /// True if this envelope targets every peer except its sender.
    pub fn is_broadcast(&self) -> bool {
        self.to.as_deref() == Some(BROADCAST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_envelope_preserves_unknown_fields() {
        let env: Envelope =
            serde_json::from_str(r#"{"to":"all","sdp":"v=0","kind":"offer"}"#).unwrap();
        assert!(env.is_broadcast());
        assert_eq!(env.rest["sdp"], "v=0");
        assert_eq!(env.rest["kind"], "offer");

        let out = serde_json::to_value(&env).unwrap();
        assert_eq!(out["sdp"], "v=0");
        assert_eq!(out["kind"], "offer");
    }

    #[test]
    fn missing_to_deserializes_as_none() {
        // Structure is accepted; the router rejects routing without `to`.
        let env: Envelope = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(env.to.is_none());
        assert!(!env.is_broadcast());
    }

    #[test]
    fn client_supplied_from_is_parsed_but_replaceable() {
        let env: Envelope = serde_json::from_str(r#"{"to":"x","from":"spoofed"}"#).unwrap();
        assert_eq!(env.from.as_ref().unwrap().as_str(), "spoofed");
    }

    #[test]
    fn new_peer_wire_shape() {
        let id = PeerId::from("abc123");
        let v = serde_json::to_value(Envelope::new_peer(&id)).unwrap();
        assert_eq!(v["type"], "new-peer");
        assert_eq!(v["from"], "abc123");
        assert!(v.get("to").is_none());
    }

    #[test]
    fn peer_gone_wire_shape() {
        let id = PeerId::from("abc123");
        let v = serde_json::to_value(Envelope::peer_gone(&id)).unwrap();
        assert_eq!(v["type"], "peer-gone");
        assert_eq!(v["from"], "abc123");
    }

    #[test]
    fn peer_list_wire_shape() {
        let own = PeerId::from("me");
        let others = vec![PeerId::from("a"), PeerId::from("b")];
        let v = serde_json::to_value(Envelope::peer_list(&own, &others)).unwrap();
        assert_eq!(v["type"], "peers");
        assert_eq!(v["you"], "me");
        assert_eq!(v["peers"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(serde_json::from_str::<Envelope>("[1,2,3]").is_err());
        assert!(serde_json::from_str::<Envelope>("\"hello\"").is_err());
        assert!(serde_json::from_str::<Envelope>("not json at all").is_err());
    }
}
