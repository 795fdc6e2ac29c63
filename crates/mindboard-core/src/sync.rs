//! Wire formats and WebSocket clients for realtime collaboration.
//!
//! Two layers travel over the socket:
//! - the relay protocol ([`ClientMessage`]/[`ServerMessage`]), which subscribes
//!   to a named channel and fans out opaque broadcast payloads;
//! - the board envelope ([`WireMessage`]), the payload those broadcasts carry.
//!
//! The relay never looks inside a broadcast, so envelopes are carried as raw
//! JSON values and only parsed by the receiving client.

use crate::shapes::{CursorData, Shape, Stroke, TextNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the websocket clients and from envelope parsing.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),
}

// ============================================================================
// Board envelope
// ============================================================================

/// A board mutation (or cursor update) broadcast to the other clients.
///
/// Serialized as `{"type": "<kind>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum BoardEvent {
    StrokeAdded { stroke: Stroke },
    StrokeUpdated { id: String, points: Vec<f64> },
    StrokesRemoved { ids: Vec<String> },
    ShapeAdded { shape: Shape },
    ShapeUpdated { id: String, x: f64, y: f64 },
    ShapesRemoved { ids: Vec<String> },
    MindmapNodesAdded { nodes: Vec<TextNode> },
    MindmapNodeRemoved { id: String },
    /// `None` means the sender's pointer left the board.
    CursorMoved { cursor: Option<CursorData> },
}

impl BoardEvent {
    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BoardEvent::StrokeAdded { .. } => "stroke-added",
            BoardEvent::StrokeUpdated { .. } => "stroke-updated",
            BoardEvent::StrokesRemoved { .. } => "strokes-removed",
            BoardEvent::ShapeAdded { .. } => "shape-added",
            BoardEvent::ShapeUpdated { .. } => "shape-updated",
            BoardEvent::ShapesRemoved { .. } => "shapes-removed",
            BoardEvent::MindmapNodesAdded { .. } => "mindmap-nodes-added",
            BoardEvent::MindmapNodeRemoved { .. } => "mindmap-node-removed",
            BoardEvent::CursorMoved { .. } => "cursor-moved",
        }
    }

    /// Reject payloads that deserialized but cannot be applied safely.
    pub fn validate(&self) -> Result<(), SyncError> {
        let check = |ok: bool, reason: &'static str| {
            if ok {
                Ok(())
            } else {
                Err(SyncError::InvalidPayload(reason))
            }
        };
        match self {
            BoardEvent::StrokeAdded { stroke } => {
                check(stroke.is_well_formed(), "stroke points must be non-empty, even and finite")
            }
            BoardEvent::StrokeUpdated { id, points } => {
                check(!id.is_empty(), "missing stroke id")?;
                let well_formed = !points.is_empty()
                    && points.len() % 2 == 0
                    && points.iter().all(|v| v.is_finite());
                check(well_formed, "stroke points must be non-empty, even and finite")
            }
            BoardEvent::StrokesRemoved { ids } | BoardEvent::ShapesRemoved { ids } => {
                check(ids.iter().all(|id| !id.is_empty()), "empty id in removal")
            }
            BoardEvent::ShapeAdded { shape } => {
                check(shape.is_well_formed(), "shape numbers must be finite with non-negative size")
            }
            BoardEvent::ShapeUpdated { id, x, y } => {
                check(!id.is_empty(), "missing shape id")?;
                check(x.is_finite() && y.is_finite(), "shape position must be finite")
            }
            BoardEvent::MindmapNodesAdded { nodes } => {
                check(nodes.iter().all(TextNode::is_well_formed), "malformed text node")
            }
            BoardEvent::MindmapNodeRemoved { id } => check(!id.is_empty(), "missing node id"),
            BoardEvent::CursorMoved { cursor } => check(
                cursor.as_ref().is_none_or(CursorData::is_well_formed),
                "cursor position must be finite",
            ),
        }
    }
}

/// The envelope every client broadcasts: `{type, senderId, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub sender_id: String,
    #[serde(flatten)]
    pub event: BoardEvent,
}

impl WireMessage {
    pub fn new(sender_id: impl Into<String>, event: BoardEvent) -> Self {
        Self {
            sender_id: sender_id.into(),
            event,
        }
    }

    /// Parse and validate an envelope received from the relay.
    pub fn parse(value: serde_json::Value) -> Result<Self, SyncError> {
        let message: WireMessage = serde_json::from_value(value)?;
        if message.sender_id.is_empty() {
            return Err(SyncError::InvalidPayload("missing senderId"));
        }
        message.event.validate()?;
        Ok(message)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, SyncError> {
        Ok(serde_json::to_value(self)?)
    }
}

// ============================================================================
// Relay protocol
// ============================================================================

/// Messages sent to the relay server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a channel, leaving any previous one. `peer_id` is the
    /// id the relay announces in `peer_joined`/`peer_left`.
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

/// Messages received from the relay server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription confirmed
    Subscribed { channel: String, peer_count: usize },
    /// Payload broadcast by another subscriber
    Broadcast { message: serde_json::Value },
    /// Peer joined the channel
    PeerJoined { peer_id: String },
    /// Peer left the channel
    PeerLeft { peer_id: String },
    /// Error message
    Error { message: String },
}

/// Connection state of a websocket client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// Subscription to a channel confirmed
    Subscribed { channel: String, peer_count: usize },
    /// Broadcast payload from another peer
    MessageReceived { message: serde_json::Value },
    /// A peer joined the channel
    PeerJoined { peer_id: String },
    /// A peer left the channel
    PeerLeft { peer_id: String },
    /// Error occurred
    Error { message: String },
}

impl From<ServerMessage> for SyncEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Subscribed { channel, peer_count } => {
                SyncEvent::Subscribed { channel, peer_count }
            }
            ServerMessage::Broadcast { message } => SyncEvent::MessageReceived { message },
            ServerMessage::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
            ServerMessage::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
            ServerMessage::Error { message } => SyncEvent::Error { message },
        }
    }
}

/// Parse a relay text frame into an event.
pub fn parse_server_frame(text: &str) -> Option<SyncEvent> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => Some(msg.into()),
        Err(e) => {
            log::warn!("Failed to parse server message: {}", e);
            None
        }
    }
}

/// Apply a client event to a connection state.
fn next_state(state: ConnectionState, event: &SyncEvent) -> ConnectionState {
    match event {
        SyncEvent::Connected => ConnectionState::Connected,
        SyncEvent::Disconnected => ConnectionState::Disconnected,
        SyncEvent::Error { .. } => ConnectionState::Error,
        _ => state,
    }
}

// ============================================================================
// WASM WebSocket Client
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    /// WebSocket client for WASM.
    ///
    /// Events are collected and must be polled via `poll_events()`.
    pub struct WasmWebSocket {
        ws: Option<WebSocket>,
        state: ConnectionState,
        events: Rc<RefCell<Vec<SyncEvent>>>,
        // Closures must outlive the socket callbacks
        _on_open: Option<Closure<dyn Fn()>>,
        _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
        _on_close: Option<Closure<dyn Fn(CloseEvent)>>,
        _on_error: Option<Closure<dyn Fn(ErrorEvent)>>,
    }

    impl WasmWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                ws: None,
                state: ConnectionState::Disconnected,
                events: Rc::new(RefCell::new(Vec::new())),
                _on_open: None,
                _on_message: None,
                _on_close: None,
                _on_error: None,
            }
        }

        /// Connect to a relay server.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.ws.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let ws = WebSocket::new(url).map_err(|e| SyncError::Connection(format!("{:?}", e)))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

            self.state = ConnectionState::Connecting;
            let events = self.events.clone();

            let events_open = events.clone();
            let on_open = Closure::wrap(Box::new(move || {
                events_open.borrow_mut().push(SyncEvent::Connected);
            }) as Box<dyn Fn()>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let events_msg = events.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                    let s: String = txt.into();
                    if let Some(event) = parse_server_frame(&s) {
                        events_msg.borrow_mut().push(event);
                    }
                }
            }) as Box<dyn Fn(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            let events_close = events.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                events_close.borrow_mut().push(SyncEvent::Disconnected);
            }) as Box<dyn Fn(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            let events_err = events;
            let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
                events_err.borrow_mut().push(SyncEvent::Error {
                    message: "WebSocket error".to_string(),
                });
            }) as Box<dyn Fn(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            self.ws = Some(ws);
            self._on_open = Some(on_open);
            self._on_message = Some(on_message);
            self._on_close = Some(on_close);
            self._on_error = Some(on_error);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(ws) = self.ws.take() {
                let _ = ws.close();
            }
            self.state = ConnectionState::Disconnected;
            self._on_open = None;
            self._on_message = None;
            self._on_close = None;
            self._on_error = None;
        }

        /// Send a text frame.
        pub fn send(&self, msg: &str) -> Result<(), SyncError> {
            match self.ws {
                Some(ref ws) => ws
                    .send_with_str(msg)
                    .map_err(|e| SyncError::Send(format!("{:?}", e))),
                None => Err(SyncError::NotConnected),
            }
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            let mut events = self.events.borrow_mut();
            for event in events.iter() {
                self.state = next_state(self.state, event);
            }
            std::mem::take(&mut *events)
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for WasmWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmWebSocket;

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::net::TcpStream;
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, connect};
    use url::Url;

    const READ_TIMEOUT: Duration = Duration::from_millis(50);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
    const LOG_PREVIEW_CHARS: usize = 100;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    /// Check that a url is a ws:// or wss:// url.
    pub(super) fn validate_url(url: &str) -> Result<Url, SyncError> {
        let parsed = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(parsed),
            other => Err(SyncError::InvalidUrl(format!("unsupported scheme: {}", other))),
        }
    }

    /// Put short timeouts on the TCP socket under `stream`, TLS or not, so a
    /// quiet connection never blocks queued sends. Returns false when the
    /// stream type is unknown.
    pub(super) fn set_socket_timeouts(stream: &MaybeTlsStream<TcpStream>) -> bool {
        let tcp = match stream {
            MaybeTlsStream::Plain(tcp) => tcp,
            MaybeTlsStream::Rustls(tls) => tls.get_ref(),
            _ => return false,
        };
        let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
        let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
        true
    }

    /// At most the first `LOG_PREVIEW_CHARS` characters of a frame.
    pub(super) fn log_preview(msg: &str) -> &str {
        match msg.char_indices().nth(LOG_PREVIEW_CHARS) {
            Some((end, _)) => &msg[..end],
            None => msg,
        }
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a relay server.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }
            validate_url(url)?;

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("WebSocket thread: connecting to {}", url);

                let (mut socket, response) = match connect(&url) {
                    Ok(ok) => ok,
                    Err(e) => {
                        log::error!("WebSocket connection failed: {}", e);
                        let _ = event_tx.send(SyncEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                        return;
                    }
                };
                log::info!("WebSocket connected, status: {}", response.status());
                let _ = event_tx.send(SyncEvent::Connected);

                // Short read timeout so the loop can interleave outgoing commands
                if !set_socket_timeouts(socket.get_ref()) {
                    log::warn!("Unknown stream type, sends may wait for incoming frames");
                }

                loop {
                    match cmd_rx.try_recv() {
                        Ok(WsCommand::Send(msg)) => {
                            log::debug!("WebSocket sending: {}", log_preview(&msg));
                            if let Err(e) = socket.send(Message::Text(msg)) {
                                log::error!("WebSocket send error: {}", e);
                                let _ = event_tx.send(SyncEvent::Error {
                                    message: format!("Send failed: {}", e),
                                });
                                break;
                            }
                        }
                        Ok(WsCommand::Close) => {
                            log::info!("WebSocket close requested");
                            let _ = socket.close(None);
                            break;
                        }
                        Err(TryRecvError::Disconnected) => {
                            log::info!("WebSocket command channel disconnected");
                            break;
                        }
                        Err(TryRecvError::Empty) => {}
                    }

                    match socket.read() {
                        Ok(Message::Text(txt)) => {
                            if let Some(event) = parse_server_frame(&txt) {
                                let _ = event_tx.send(event);
                            }
                        }
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("WebSocket received close frame");
                            break;
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            log::error!("WebSocket read error: {}", e);
                            let _ = event_tx.send(SyncEvent::Error {
                                message: format!("Read failed: {}", e),
                            });
                            break;
                        }
                    }
                }

                log::info!("WebSocket thread exiting");
                let _ = event_tx.send(SyncEvent::Disconnected);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Send a text frame.
        pub fn send(&self, msg: &str) -> Result<(), SyncError> {
            match self.cmd_tx {
                Some(ref tx) => tx
                    .send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| SyncError::Send(e.to_string())),
                None => Err(SyncError::NotConnected),
            }
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    self.state = next_state(self.state, &event);
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;

// ============================================================================
// Platform type alias
// ============================================================================

/// Platform-specific WebSocket client type.
#[cfg(target_arch = "wasm32")]
pub type PlatformWebSocket = WasmWebSocket;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformWebSocket = NativeWebSocket;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serialize() {
        let msg = WireMessage::new(
            "me",
            BoardEvent::StrokesRemoved {
                ids: vec!["s1".into()],
            },
        );
        let value = msg.to_value().unwrap();
        assert_eq!(
            value,
            json!({"type": "strokes-removed", "senderId": "me", "payload": {"ids": ["s1"]}})
        );
    }

    #[test]
    fn test_envelope_parse() {
        let value = json!({
            "type": "stroke-added",
            "senderId": "peer",
            "payload": {"stroke": {"id": "s1", "points": [0, 0, 10, 10], "color": "#000"}}
        });
        let msg = WireMessage::parse(value).unwrap();
        assert_eq!(msg.sender_id, "peer");
        match msg.event {
            BoardEvent::StrokeAdded { stroke } => {
                assert_eq!(stroke.points, vec![0.0, 0.0, 10.0, 10.0])
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_cursor_left_is_null() {
        let msg = WireMessage::new("me", BoardEvent::CursorMoved { cursor: None });
        let value = msg.to_value().unwrap();
        assert_eq!(value["payload"]["cursor"], serde_json::Value::Null);
        assert_eq!(WireMessage::parse(value).unwrap(), msg);
    }

    #[test]
    fn test_every_kind_name_matches_serde() {
        let events = vec![
            BoardEvent::StrokeAdded { stroke: Stroke::new(vec![0.0, 0.0], "#000") },
            BoardEvent::StrokeUpdated { id: "s".into(), points: vec![1.0, 1.0] },
            BoardEvent::StrokesRemoved { ids: vec![] },
            BoardEvent::ShapeAdded {
                shape: Shape::new(
                    crate::shapes::ShapeKind::Ellipse,
                    kurbo::Rect::new(0.0, 0.0, 4.0, 4.0),
                ),
            },
            BoardEvent::ShapeUpdated { id: "r".into(), x: 1.0, y: 2.0 },
            BoardEvent::ShapesRemoved { ids: vec!["r".into()] },
            BoardEvent::MindmapNodesAdded { nodes: vec![TextNode::new("a", 0.0, 0.0)] },
            BoardEvent::MindmapNodeRemoved { id: "n".into() },
            BoardEvent::CursorMoved { cursor: None },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind());
        }
    }

    #[test]
    fn test_rejects_invalid_payloads() {
        let envelope = |kind: &str, payload: serde_json::Value| {
            json!({"type": kind, "senderId": "p", "payload": payload})
        };
        let cases = [
            envelope(
                "stroke-added",
                json!({"stroke": {"id": "s", "points": [], "color": "#000"}}),
            ),
            envelope(
                "stroke-added",
                json!({"stroke": {"id": "s", "points": [1, 2, 3], "color": "#000"}}),
            ),
            envelope("stroke-updated", json!({"id": "s", "points": [1, "x"]})),
            envelope(
                "shape-added",
                json!({"shape": {"type": "rectangle", "x": 0, "y": 0, "width": -1, "height": 4}}),
            ),
            envelope("shape-updated", json!({"id": "r"})),
            json!({"type": "cursor-moved", "senderId": "", "payload": {"cursor": null}}),
            envelope("lasso-drawn", json!({})),
            json!({"type": "strokes-removed", "payload": {"ids": ["a"]}}),
        ];
        for case in cases {
            assert!(WireMessage::parse(case.clone()).is_err(), "accepted {}", case);
        }
    }

    #[test]
    fn test_rejects_nested_payload() {
        let value = json!({
            "type": "stroke-added",
            "senderId": "p",
            "payload": {"payload": {"stroke": {"id": "s", "points": [0, 0], "color": "#000"}}}
        });
        assert!(WireMessage::parse(value).is_err());
    }

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Subscribe {
            channel: "board:b1".to_string(),
            peer_id: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","channel":"board:b1"}"#);

        let msg = ClientMessage::Subscribe {
            channel: "board:b1".to_string(),
            peer_id: Some("me".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","channel":"board:b1","peer_id":"me"}"#);

        let msg = ClientMessage::Broadcast { message: json!({"type": "x"}) };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "broadcast");
        assert_eq!(value["message"]["type"], "x");
    }

    #[test]
    fn test_server_message_deserialize() {
        let frame = r#"{"type":"subscribed","channel":"board:b1","peer_count":2}"#;
        let event = parse_server_frame(frame);
        assert_eq!(
            event,
            Some(SyncEvent::Subscribed { channel: "board:b1".into(), peer_count: 2 })
        );
        let event = parse_server_frame(r#"{"type":"peer_left","peer_id":"x"}"#);
        assert_eq!(event, Some(SyncEvent::PeerLeft { peer_id: "x".into() }));
        assert_eq!(parse_server_frame("not json"), None);
    }

    #[test]
    fn test_connection_state_transitions() {
        let state = next_state(ConnectionState::Connecting, &SyncEvent::Connected);
        assert_eq!(state, ConnectionState::Connected);
        let state = next_state(state, &SyncEvent::PeerJoined { peer_id: "p".into() });
        assert_eq!(state, ConnectionState::Connected);
        let state = next_state(state, &SyncEvent::Error { message: "x".into() });
        assert_eq!(state, ConnectionState::Error);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_client_url_validation() {
        let mut client = NativeWebSocket::new();
        assert!(matches!(client.connect("http://localhost:3030"), Err(SyncError::InvalidUrl(_))));
        assert!(matches!(client.connect("not a url"), Err(SyncError::InvalidUrl(_))));
        assert!(matches!(client.send("x"), Err(SyncError::NotConnected)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(native_client::validate_url("wss://example.com/ws").is_ok());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_log_preview_cuts_on_char_boundary() {
        let name = format!("a{}", "김철수".repeat(40));
        let frame = format!(r#"{{"type":"broadcast","message":{{"displayName":"{}"}}}}"#, name);
        let preview = native_client::log_preview(&frame);
        assert_eq!(preview.chars().count(), 100);
        assert!(frame.starts_with(preview));
        assert_eq!(native_client::log_preview("short"), "short");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_socket_timeouts_on_plain_stream() {
        use std::net::{TcpListener, TcpStream};
        use tungstenite::stream::MaybeTlsStream;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let tcp = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let stream = MaybeTlsStream::Plain(tcp);
        assert!(native_client::set_socket_timeouts(&stream));
        let MaybeTlsStream::Plain(tcp) = &stream else {
            unreachable!()
        };
        assert!(tcp.read_timeout().unwrap().is_some());
        assert!(tcp.write_timeout().unwrap().is_some());
    }
}
