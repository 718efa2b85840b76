//! # Realtime Bus
//!
//! In-memory registry of connected WebSocket peers, tagged by role.
//!
//! ## Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Realtime Fan-out                                 │
//! │                                                                         │
//! │  /ws?terminalId=... ──► role resolved from the terminal record          │
//! │                         (never client-supplied)                         │
//! │                                                                         │
//! │  broadcast(event, data, filter) ──► frame {event, data, timestamp}      │
//! │    filter: everyone | one role | everyone except one client             │
//! │                                                                         │
//! │  Best-effort, fire-and-forget: a dead socket is ignored and reaped on   │
//! │  its close/error. No replay, no queueing - clients that missed events   │
//! │  re-read state over HTTP on reconnect.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every broadcast happens after the enclosing store transaction commits,
//! never inside it - handlers commit first, then emit.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use harbor_core::{new_id, TerminalRole, TerminalStatus};

use crate::state::AppState;

/// Per-peer outgoing queue depth; a peer lagging further than this starts
/// dropping frames (fire-and-forget).
const PEER_QUEUE_DEPTH: usize = 64;

// =============================================================================
// Registry
// =============================================================================

/// A connected WebSocket peer.
#[derive(Debug, Clone)]
pub struct Peer {
    pub terminal_id: Option<String>,
    pub role: TerminalRole,
    sender: mpsc::Sender<Message>,
    pub connected_at: Instant,
}

/// Which peers a broadcast reaches.
#[derive(Debug, Clone)]
pub enum BroadcastFilter {
    /// Every open socket.
    All,
    /// Only peers with this role (e.g. kitchen events to kds).
    Role(TerminalRole),
    /// Everyone except the named client (echo suppression).
    ExcludeClient(String),
}

/// Registry of connected peers with role-filtered broadcast.
#[derive(Clone, Default)]
pub struct RealtimeBus {
    peers: Arc<RwLock<HashMap<String, Peer>>>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, client_id: String, peer: Peer) {
        let mut peers = self.peers.write().await;
        peers.insert(client_id, peer);
    }

    async fn unregister(&self, client_id: &str) {
        let mut peers = self.peers.write().await;
        if peers.remove(client_id).is_some() {
            debug!(client_id, "Peer removed from realtime registry");
        }
    }

    pub async fn client_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Broadcasts a `{event, data, timestamp}` frame. Send failures are
    /// ignored; the dead peer is reaped by its own connection task.
    pub async fn broadcast(&self, event: &str, data: Value, filter: Option<BroadcastFilter>) {
        let frame = frame(event, data);

        // Snapshot the senders so sends happen outside the lock.
        let targets: Vec<mpsc::Sender<Message>> = {
            let peers = self.peers.read().await;
            peers
                .iter()
                .filter(|(client_id, peer)| match &filter {
                    None | Some(BroadcastFilter::All) => true,
                    Some(BroadcastFilter::Role(role)) => peer.role == *role,
                    Some(BroadcastFilter::ExcludeClient(excluded)) => *client_id != excluded,
                })
                .map(|(_, peer)| peer.sender.clone())
                .collect()
        };

        debug!(event, targets = targets.len(), "Broadcasting realtime event");

        for sender in targets {
            let _ = sender.try_send(Message::Text(frame.clone().into()));
        }
    }

    /// Targeted send to every peer of one terminal.
    pub async fn send_to_terminal(&self, terminal_id: &str, event: &str, data: Value) {
        let frame = frame(event, data);

        let targets: Vec<mpsc::Sender<Message>> = {
            let peers = self.peers.read().await;
            peers
                .values()
                .filter(|peer| peer.terminal_id.as_deref() == Some(terminal_id))
                .map(|peer| peer.sender.clone())
                .collect()
        };

        for sender in targets {
            let _ = sender.try_send(Message::Text(frame.clone().into()));
        }
    }
}

fn frame(event: &str, data: Value) -> String {
    json!({
        "event": event,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}

// =============================================================================
// WebSocket Endpoint
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    pub terminal_id: Option<String>,
}

/// `GET /ws` - WebSocket upgrade. The peer's role comes from its terminal
/// record; unknown terminals connect as plain POS peers.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.terminal_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, terminal_id: Option<String>) {
    let client_id = new_id();

    // Role is resolved server-side at connect time.
    let role = match &terminal_id {
        Some(terminal_id) => match state.db.terminals().get(terminal_id).await {
            Ok(Some(terminal)) => terminal.role,
            Ok(None) => TerminalRole::default(),
            Err(e) => {
                warn!(?e, terminal_id, "Failed to resolve terminal role");
                TerminalRole::default()
            }
        },
        None => TerminalRole::default(),
    };

    info!(client_id, ?terminal_id, ?role, "WebSocket peer connected");

    if let Some(terminal_id) = &terminal_id {
        if let Err(e) = state
            .db
            .terminals()
            .set_status(terminal_id, TerminalStatus::Online)
            .await
        {
            warn!(?e, terminal_id, "Failed to mark terminal online");
        }
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(PEER_QUEUE_DEPTH);

    state
        .bus
        .register(
            client_id.clone(),
            Peer {
                terminal_id: terminal_id.clone(),
                role,
                sender: outgoing_tx,
                connected_at: Instant::now(),
            },
        )
        .await;

    // Outgoing pump
    let outgoing_handle = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Incoming loop: the surface is broadcast-only, so inbound frames are
    // only connection upkeep.
    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Close(_)) => {
                debug!(client_id, "Peer requested close");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(_) => {}
            Err(e) => {
                debug!(client_id, ?e, "WebSocket error");
                break;
            }
        }
    }

    outgoing_handle.abort();
    state.bus.unregister(&client_id).await;

    if let Some(terminal_id) = &terminal_id {
        if let Err(e) = state
            .db
            .terminals()
            .set_status(terminal_id, TerminalStatus::Offline)
            .await
        {
            warn!(?e, terminal_id, "Failed to mark terminal offline");
        }
    }

    info!(client_id, "WebSocket peer disconnected");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn peer(bus: &RealtimeBus, id: &str, role: TerminalRole) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(8);
        bus.register(
            id.to_string(),
            Peer {
                terminal_id: Some(format!("term-{id}")),
                role,
                sender: tx,
                connected_at: Instant::now(),
            },
        )
        .await;
        rx
    }

    fn text_of(message: Message) -> Value {
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_role_filter_reaches_only_that_role() {
        let bus = RealtimeBus::new();
        let mut kds = peer(&bus, "kds1", TerminalRole::Kds).await;
        let mut pos = peer(&bus, "pos1", TerminalRole::Pos).await;

        bus.broadcast(
            "order:created",
            json!({"id": "k1"}),
            Some(BroadcastFilter::Role(TerminalRole::Kds)),
        )
        .await;

        let frame = text_of(kds.recv().await.unwrap());
        assert_eq!(frame["event"], "order:created");
        assert!(frame["timestamp"].is_string());

        assert!(pos.try_recv().is_err(), "pos peer must not receive kds event");
    }

    #[tokio::test]
    async fn test_exclude_client_filter() {
        let bus = RealtimeBus::new();
        let mut origin = peer(&bus, "origin", TerminalRole::Pos).await;
        let mut other = peer(&bus, "other", TerminalRole::Pos).await;

        bus.broadcast(
            "table:updated",
            json!({"id": "t1"}),
            Some(BroadcastFilter::ExcludeClient("origin".into())),
        )
        .await;

        assert!(other.recv().await.is_some());
        assert!(origin.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_peer_does_not_break_broadcast() {
        let bus = RealtimeBus::new();
        let dead_rx = peer(&bus, "dead", TerminalRole::Pos).await;
        drop(dead_rx);
        let mut live = peer(&bus, "live", TerminalRole::Pos).await;

        bus.broadcast("order:status", json!({}), None).await;

        assert!(live.recv().await.is_some());
        assert_eq!(bus.client_count().await, 2);
    }

    #[tokio::test]
    async fn test_send_to_terminal_targets_one_terminal() {
        let bus = RealtimeBus::new();
        let mut a = peer(&bus, "a", TerminalRole::Pos).await;
        let mut b = peer(&bus, "b", TerminalRole::Pos).await;

        bus.send_to_terminal("term-a", "call:incoming", json!({"number": "555"}))
            .await;

        assert!(a.recv().await.is_some());
        assert!(b.try_recv().is_err());
    }
}
