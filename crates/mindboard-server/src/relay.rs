//! Channel relay.
//!
//! Every websocket session may subscribe to one named channel at a time. A
//! subscriber may name itself with `peer_id`; otherwise the relay's own id
//! for the connection is announced.
//! Broadcast payloads are opaque JSON fanned out to the other subscribers of
//! that channel; the relay never echoes a payload back to its sender.
//!
//! ## Protocol
//!
//! ```json
//! { "type": "subscribe", "channel": "board:42", "peer_id": "..." }
//! { "type": "unsubscribe" }
//! { "type": "broadcast", "message": { ... } }
//! ```
//!
//! Replies and fan-out:
//!
//! ```json
//! { "type": "subscribed", "channel": "board:42", "peer_count": 2 }
//! { "type": "broadcast", "message": { ... } }
//! { "type": "peer_joined", "peer_id": "..." }
//! { "type": "peer_left", "peer_id": "..." }
//! { "type": "error", "message": "..." }
//! ```

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A message sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a channel, leaving the current one
    Subscribe {
        channel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        peer_id: Option<String>,
    },
    /// Leave the current channel
    Unsubscribe,
    /// Fan a payload out to the other subscribers
    Broadcast { message: serde_json::Value },
}

/// A message sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm a subscription
    Subscribed { channel: String, peer_count: usize },
    /// Payload from another subscriber
    Broadcast { message: serde_json::Value },
    /// Peer subscribed to the channel
    PeerJoined { peer_id: String },
    /// Peer left the channel
    PeerLeft { peer_id: String },
    /// Error message
    Error { message: String },
}

/// Sender peer id and the message to deliver.
type Envelope = (String, ServerMessage);

struct Channel {
    tx: broadcast::Sender<Envelope>,
    peers: HashSet<String>,
}

impl Channel {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Active channels keyed by name.
#[derive(Default)]
pub struct Relay {
    channels: DashMap<String, Channel>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to a channel, creating it on first use. Returns the
    /// receiver for the channel and the subscriber count including the peer.
    pub fn subscribe(
        &self,
        channel: &str,
        peer_id: &str,
    ) -> (broadcast::Receiver<Envelope>, usize) {
        let mut entry = self.channels.entry(channel.to_string()).or_insert_with(Channel::new);
        entry.peers.insert(peer_id.to_string());
        let rx = entry.tx.subscribe();
        let peer_count = entry.peers.len();
        drop(entry);

        self.broadcast(
            channel,
            peer_id,
            ServerMessage::PeerJoined {
                peer_id: peer_id.to_string(),
            },
        );
        (rx, peer_count)
    }

    /// Remove a peer from a channel and tell the remaining subscribers.
    /// Empty channels are dropped.
    pub fn unsubscribe(&self, channel: &str, peer_id: &str) {
        let now_empty = match self.channels.get_mut(channel) {
            Some(mut entry) => {
                entry.peers.remove(peer_id);
                entry.peers.is_empty()
            }
            None => return,
        };
        if now_empty {
            self.channels.remove_if(channel, |_, c| c.peers.is_empty());
            debug!("Channel {} closed", channel);
        } else {
            self.broadcast(
                channel,
                peer_id,
                ServerMessage::PeerLeft {
                    peer_id: peer_id.to_string(),
                },
            );
        }
    }

    /// Send a message to every subscriber of a channel.
    pub fn broadcast(&self, channel: &str, from: &str, msg: ServerMessage) {
        if let Some(entry) = self.channels.get(channel) {
            // No receivers is not an error: the sender may be alone.
            let _ = entry.tx.send((from.to_string(), msg));
        }
    }

    pub fn peer_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|c| c.peers.len()).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Relay state of one websocket connection.
pub struct Session {
    peer_id: String,
    channel: Option<String>,
    rx: Option<broadcast::Receiver<Envelope>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            peer_id: Uuid::new_v4().to_string(),
            channel: None,
            rx: None,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Apply a client message. Returns the direct reply, if any.
    pub fn handle(&mut self, relay: &Relay, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Subscribe { channel, peer_id } => {
                self.leave(relay);
                if let Some(id) = peer_id.filter(|id| !id.trim().is_empty()) {
                    self.peer_id = id;
                }
                let (rx, peer_count) = relay.subscribe(&channel, &self.peer_id);
                info!("Peer {} subscribed to {} ({} peers)", self.peer_id, channel, peer_count);
                self.rx = Some(rx);
                self.channel = Some(channel.clone());
                Some(ServerMessage::Subscribed { channel, peer_count })
            }
            ClientMessage::Unsubscribe => {
                self.leave(relay);
                None
            }
            ClientMessage::Broadcast { message } => match &self.channel {
                Some(channel) => {
                    relay.broadcast(channel, &self.peer_id, ServerMessage::Broadcast { message });
                    None
                }
                None => Some(ServerMessage::Error {
                    message: "Not subscribed to a channel".to_string(),
                }),
            },
        }
    }

    /// Leave the current channel, if any.
    pub fn leave(&mut self, relay: &Relay) {
        if let Some(channel) = self.channel.take() {
            relay.unsubscribe(&channel, &self.peer_id);
            info!(
                "Peer {} left {} ({} remaining)",
                self.peer_id,
                channel,
                relay.peer_count(&channel)
            );
        }
        self.rx = None;
    }

    /// Filter a fanned-out envelope: messages from this peer are not echoed.
    pub fn deliver(&self, (from, msg): Envelope) -> Option<ServerMessage> {
        (from != self.peer_id).then_some(msg)
    }

    /// Wait for the next envelope of the subscribed channel. Pends forever
    /// while unsubscribed.
    async fn recv(&mut self) -> Option<Envelope> {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            match rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Peer {} lagged, skipped {} messages", self.peer_id, skipped);
                }
                Err(RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode server message: {}", e);
            None
        }
    }
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let mut session = Session::new();
    info!("New connection: {}", session.peer_id());

    let (mut sender, mut receiver) = socket.split();

    loop {
        let outgoing = tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => session.handle(&relay, client_msg),
                        Err(e) => {
                            warn!("Invalid message from {}: {}", session.peer_id(), e);
                            Some(ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            })
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None, // Ignore binary/ping/pong
                Some(Err(e)) => {
                    warn!("WebSocket error for {}: {}", session.peer_id(), e);
                    break;
                }
            },
            envelope = session.recv() => envelope.and_then(|e| session.deliver(e)),
        };

        if let Some(frame) = outgoing.as_ref().and_then(encode) {
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    }

    session.leave(&relay);
    info!(
        "Connection closed: {} ({} channels active)",
        session.peer_id(),
        relay.channel_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscribe(session: &mut Session, relay: &Relay, channel: &str) -> Option<ServerMessage> {
        session.handle(
            relay,
            ClientMessage::Subscribe {
                channel: channel.to_string(),
                peer_id: None,
            },
        )
    }

    /// Everything queued for a session, with its own messages filtered out.
    fn drain(session: &mut Session) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        if let Some(rx) = session.rx.as_mut() {
            while let Ok(envelope) = rx.try_recv() {
                out.push(envelope);
            }
        }
        out.into_iter().filter_map(|e| session.deliver(e)).collect()
    }

    #[test]
    fn test_protocol_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"board:1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                channel: "board:1".into(),
                peer_id: None,
            }
        );
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"board:1","peer_id":"s1"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                channel: "board:1".into(),
                peer_id: Some("s1".into()),
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"unsubscribe"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unsubscribe);

        let json = serde_json::to_value(ServerMessage::PeerLeft {
            peer_id: "p".into(),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "peer_left", "peer_id": "p"}));
    }

    #[test]
    fn test_subscribe_counts_peers() {
        let relay = Relay::new();
        let mut a = Session::new();
        let mut b = Session::new();

        assert_eq!(
            subscribe(&mut a, &relay, "board:1"),
            Some(ServerMessage::Subscribed {
                channel: "board:1".into(),
                peer_count: 1
            })
        );
        assert_eq!(
            subscribe(&mut b, &relay, "board:1"),
            Some(ServerMessage::Subscribed {
                channel: "board:1".into(),
                peer_count: 2
            })
        );
        assert_eq!(relay.peer_count("board:1"), 2);
        assert_eq!(
            drain(&mut a),
            vec![ServerMessage::PeerJoined {
                peer_id: b.peer_id().to_string()
            }]
        );
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let relay = Relay::new();
        let mut a = Session::new();
        let mut b = Session::new();
        let mut c = Session::new();
        subscribe(&mut a, &relay, "board:1");
        subscribe(&mut b, &relay, "board:1");
        subscribe(&mut c, &relay, "board:2");
        drain(&mut a);
        drain(&mut b);

        let payload = json!({"type": "stroke-added", "senderId": "x", "payload": {}});
        let reply = a.handle(
            &relay,
            ClientMessage::Broadcast {
                message: payload.clone(),
            },
        );
        assert!(reply.is_none());

        assert!(drain(&mut a).is_empty());
        assert_eq!(drain(&mut b), vec![ServerMessage::Broadcast { message: payload }]);
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn test_broadcast_without_channel_is_an_error() {
        let relay = Relay::new();
        let mut a = Session::new();
        let reply = a.handle(&relay, ClientMessage::Broadcast { message: json!({}) });
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
    }

    #[test]
    fn test_switching_channels_leaves_the_old_one() {
        let relay = Relay::new();
        let mut a = Session::new();
        let mut b = Session::new();
        subscribe(&mut a, &relay, "board:1");
        subscribe(&mut b, &relay, "board:1");
        drain(&mut a);

        subscribe(&mut b, &relay, "board:2");
        assert_eq!(b.channel.as_deref(), Some("board:2"));
        assert_eq!(relay.peer_count("board:1"), 1);
        assert_eq!(
            drain(&mut a),
            vec![ServerMessage::PeerLeft {
                peer_id: b.peer_id().to_string()
            }]
        );
    }

    #[test]
    fn test_named_subscriber_is_announced_by_its_own_id() {
        let relay = Relay::new();
        let mut a = Session::new();
        let mut b = Session::new();
        subscribe(&mut a, &relay, "board:1");
        let named = ClientMessage::Subscribe {
            channel: "board:1".into(),
            peer_id: Some("session-b".into()),
        };
        b.handle(&relay, named);
        assert_eq!(b.peer_id(), "session-b");
        assert_eq!(
            drain(&mut a),
            vec![ServerMessage::PeerJoined {
                peer_id: "session-b".into()
            }]
        );

        b.leave(&relay);
        assert_eq!(
            drain(&mut a),
            vec![ServerMessage::PeerLeft {
                peer_id: "session-b".into()
            }]
        );

        // A blank id keeps the relay-assigned one.
        let mut c = Session::new();
        let relay_id = c.peer_id().to_string();
        let blank = ClientMessage::Subscribe {
            channel: "board:1".into(),
            peer_id: Some("  ".into()),
        };
        c.handle(&relay, blank);
        assert_eq!(c.peer_id(), relay_id);
    }

    #[test]
    fn test_last_peer_closes_channel() {
        let relay = Relay::new();
        let mut a = Session::new();
        subscribe(&mut a, &relay, "board:1");
        assert_eq!(relay.channel_count(), 1);

        assert!(a.handle(&relay, ClientMessage::Unsubscribe).is_none());
        assert_eq!(relay.channel_count(), 0);
        assert_eq!(a.channel, None);

        // Leaving twice is harmless.
        a.leave(&relay);
        assert_eq!(relay.channel_count(), 0);
    }
}
