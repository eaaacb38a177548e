//! WebSocket signaling session: one task per connected peer.
//!
//! The session registers itself, forwards its outbound channel into the
//! socket, and feeds every inbound text frame through the router. Any
//! decode or structure failure is fatal to this session only; cleanup
//! always unregisters before the task returns so no later routing step
//! targets a dead connection.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::envelope::Envelope;
use crate::server::Registry;

/// Why a session's loop ended.
#[derive(Debug)]
enum SessionEnd {
    /// Clean close or EOF from the client
    ClientClosed,
    /// Non-JSON frame, non-text frame, or an envelope without `to`
    Malformed(String),
    /// Socket-level fault in either direction
    Transport(String),
}

/// Handle a single signaling WebSocket connection.
pub async fn handle_ws(socket: WebSocket, registry: Registry) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let registration = registry.register(tx).await;
    let id = registration.id;

    // Welcome envelope: own id plus the peers present at join time.
    let welcome = Envelope::peer_list(&id, &registration.peers);
    if send_envelope(&mut ws_tx, &welcome).await.is_err() {
        warn!(peer = %id, "Failed to send welcome, closing session");
        registry.unregister(&id).await;
        return;
    }

    let end = loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(envelope) => {
                        if send_envelope(&mut ws_tx, &envelope).await.is_err() {
                            break SessionEnd::Transport("send failed".into());
                        }
                    }
                    // Registry dropped our entry; nothing left to forward
                    None => break SessionEnd::Transport("outbound channel closed".into()),
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(envelope) => {
                                if let Err(e) = registry.route(&id, envelope).await {
                                    break SessionEnd::Malformed(e.to_string());
                                }
                            }
                            Err(e) => break SessionEnd::Malformed(e.to_string()),
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        break SessionEnd::Malformed("binary frame on signaling socket".into());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break SessionEnd::ClientClosed,
                    Some(Err(e)) => break SessionEnd::Transport(e.to_string()),
                }
            }
        }
    };

    // Must run before the task returns; ids are never reused, so a late
    // envelope addressed to us after this point is silently dropped.
    registry.unregister(&id).await;

    match end {
        SessionEnd::ClientClosed => info!(peer = %id, "Session closed by client"),
        SessionEnd::Malformed(reason) => {
            warn!(peer = %id, %reason, "Session terminated: malformed input")
        }
        SessionEnd::Transport(reason) => {
            debug!(peer = %id, %reason, "Session terminated: transport fault")
        }
    }
}

async fn send_envelope(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    envelope: &Envelope,
) -> Result<(), axum::Error> {
    match serde_json::to_string(envelope) {
        Ok(json) => ws_tx.send(Message::Text(json.into())).await,
        Err(e) => {
            // An envelope that came in as JSON always goes back out as JSON;
            // treat the impossible case as a skipped delivery.
            warn!(error = %e, "Failed to serialize envelope, skipping");
            Ok(())
        }
    }
}
