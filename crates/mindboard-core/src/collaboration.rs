//! Realtime transport: mirrors local board edits to the other clients on the
//! same board and folds their edits back into the local store.
//!
//! The transport does no I/O itself. Relay frames to send accumulate in an
//! outgoing queue drained with [`RealtimeTransport::take_outgoing`], and frames
//! received from the relay are fed in through
//! [`RealtimeTransport::handle_message`] or [`RealtimeTransport::handle_event`].

use crate::board::BoardStore;
use crate::shapes::{CursorData, Shape, Stroke, TextNode};
use crate::sync::{BoardEvent, ClientMessage, SyncEvent, WireMessage, parse_server_frame};
use crate::throttle::{CURSOR_THROTTLE_INTERVAL, Clock, Throttle};
use kurbo::Point;
use std::time::Duration;
use uuid::Uuid;

/// Prefix of every board channel name.
pub const CHANNEL_PREFIX: &str = "board:";

/// Colours handed out to cursors when none is configured.
const CURSOR_COLORS: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6", "#ec4899",
];

/// Channel name for a board.
pub fn channel_name(board_id: &str) -> String {
    format!("{}{}", CHANNEL_PREFIX, board_id)
}

/// Lifecycle of the board channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel.
    Disconnected,
    /// Subscription requested; outgoing messages are buffered.
    Connecting,
    /// Subscription confirmed; messages go out immediately.
    Subscribed,
}

/// Tunables for [`RealtimeTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Minimum spacing between two cursor broadcasts.
    pub cursor_interval: Duration,
    /// Colour of this client's cursor as seen by others. Derived from the
    /// session id when unset.
    pub cursor_color: Option<String>,
    /// Name shown next to this client's cursor.
    pub display_name: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            cursor_interval: CURSOR_THROTTLE_INTERVAL,
            cursor_color: None,
            display_name: None,
        }
    }
}

/// Sans-IO realtime transport for one client.
pub struct RealtimeTransport {
    /// Random id tagging every message this client sends.
    session_id: String,
    state: ChannelState,
    /// Channel of the selected board, kept across connection loss.
    channel: Option<String>,
    /// Envelopes sent while the subscription is still pending.
    pending: Vec<WireMessage>,
    /// Relay frames ready to be written to the socket.
    outgoing: Vec<String>,
    cursor_throttle: Throttle<Point>,
    cursor_color: String,
    display_name: Option<String>,
    clock: Clock,
}

impl RealtimeTransport {
    pub fn new(config: TransportConfig) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let cursor_color = config
            .cursor_color
            .unwrap_or_else(|| color_for(&session_id).to_string());
        Self {
            session_id,
            state: ChannelState::Disconnected,
            channel: None,
            pending: Vec::new(),
            outgoing: Vec::new(),
            cursor_throttle: Throttle::new(config.cursor_interval),
            cursor_color,
            display_name: config.display_name,
            clock: Clock::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == ChannelState::Subscribed
    }

    /// Messages buffered until the subscription completes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Time on the transport's own clock, for [`RealtimeTransport::tick`].
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn set_display_name(&mut self, name: Option<String>) {
        self.display_name = name;
    }

    // --- Channel lifecycle ---

    /// Switch to another board, or to none. Tears down the current channel
    /// first: buffered messages are discarded and remote cursors cleared.
    pub fn select_board(&mut self, store: &mut BoardStore, board_id: Option<&str>) {
        self.teardown(store);
        if self.channel.take().is_some() {
            self.queue_frame(&ClientMessage::Unsubscribe);
        }
        store.set_current_board_id(board_id.map(str::to_string));
        if let Some(id) = board_id {
            self.channel = Some(channel_name(id));
            self.subscribe();
        }
    }

    /// Leave the current board (logout).
    pub fn leave(&mut self, store: &mut BoardStore) {
        self.select_board(store, None);
    }

    /// Request the selected channel. The session id goes along so peers can
    /// match our `peer_left` to our cursor. A request still sitting in the
    /// outgoing queue is not repeated.
    fn subscribe(&mut self) {
        let Some(channel) = self.channel.clone() else {
            return;
        };
        self.state = ChannelState::Connecting;
        let request = ClientMessage::Subscribe {
            channel: channel.clone(),
            peer_id: Some(self.session_id.clone()),
        };
        match serde_json::to_string(&request) {
            Ok(json) if self.outgoing.contains(&json) => {}
            Ok(json) => {
                log::info!("Subscribing to {}", channel);
                self.outgoing.push(json);
            }
            Err(e) => log::warn!("Failed to encode relay frame: {}", e),
        }
    }

    fn teardown(&mut self, store: &mut BoardStore) {
        if !self.pending.is_empty() {
            log::debug!("Discarding {} unsent messages", self.pending.len());
        }
        self.pending.clear();
        self.cursor_throttle.reset();
        store.clear_cursors();
        self.state = ChannelState::Disconnected;
    }

    // --- Incoming ---

    /// Handle a raw relay frame.
    pub fn handle_message(&mut self, store: &mut BoardStore, json: &str) -> Option<SyncEvent> {
        let event = parse_server_frame(json)?;
        self.handle_event(store, event)
    }

    /// Handle an event from the websocket client. Board messages are applied to
    /// the store and consumed; everything else is passed back to the caller.
    pub fn handle_event(&mut self, store: &mut BoardStore, event: SyncEvent) -> Option<SyncEvent> {
        match event {
            SyncEvent::Connected => {
                // An earlier request may have been lost before the socket opened.
                if self.state != ChannelState::Subscribed {
                    self.subscribe();
                }
                Some(SyncEvent::Connected)
            }
            SyncEvent::Subscribed { channel, peer_count } => {
                if self.state != ChannelState::Connecting
                    || self.channel.as_deref() != Some(channel.as_str())
                {
                    log::debug!("Ignoring stale subscription to {}", channel);
                    return None;
                }
                log::info!("Subscribed to {} ({} peers)", channel, peer_count);
                self.state = ChannelState::Subscribed;
                for message in std::mem::take(&mut self.pending) {
                    self.queue_broadcast(&message);
                }
                Some(SyncEvent::Subscribed { channel, peer_count })
            }
            SyncEvent::MessageReceived { message } => {
                if self.state == ChannelState::Disconnected {
                    log::debug!("Dropping message received without a channel");
                } else {
                    self.apply_remote(store, message);
                }
                None
            }
            SyncEvent::Disconnected => {
                log::info!("Connection closed");
                self.teardown(store);
                Some(SyncEvent::Disconnected)
            }
            SyncEvent::Error { message } => {
                log::warn!("Channel error: {}", message);
                self.teardown(store);
                Some(SyncEvent::Error { message })
            }
            SyncEvent::PeerLeft { peer_id } => {
                store.set_cursor(&peer_id, None);
                Some(SyncEvent::PeerLeft { peer_id })
            }
            other @ SyncEvent::PeerJoined { .. } => Some(other),
        }
    }

    /// Validate a broadcast envelope from another client and apply it to the
    /// store. Never re-broadcasts and never touches undo history. Returns
    /// whether the store was changed.
    pub fn apply_remote(&self, store: &mut BoardStore, value: serde_json::Value) -> bool {
        let message = match WireMessage::parse(value) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Dropping inbound message: {}", e);
                return false;
            }
        };
        if message.sender_id == self.session_id {
            log::debug!("Dropping own {} echo", message.event.kind());
            return false;
        }

        let sender = message.sender_id;
        match message.event {
            BoardEvent::StrokeAdded { stroke } => store.add_stroke(stroke),
            BoardEvent::StrokeUpdated { id, points } => store.update_stroke(&id, points),
            BoardEvent::StrokesRemoved { ids } => store.remove_strokes(&ids) > 0,
            BoardEvent::ShapeAdded { shape } => store.add_shape(shape),
            BoardEvent::ShapeUpdated { id, x, y } => store.update_shape(&id, x, y),
            BoardEvent::ShapesRemoved { ids } => store.remove_shapes(&ids) > 0,
            BoardEvent::MindmapNodesAdded { nodes } => store.add_text_nodes(nodes) > 0,
            BoardEvent::MindmapNodeRemoved { id } => store.remove_text_node(&id),
            BoardEvent::CursorMoved { cursor } => {
                store.set_cursor(&sender, cursor);
                true
            }
        }
    }

    // --- Outgoing ---

    /// Send a board event to the other clients, or buffer it until the
    /// subscription completes.
    pub fn broadcast(&mut self, event: BoardEvent) {
        let message = WireMessage::new(self.session_id.clone(), event);
        match self.state {
            ChannelState::Disconnected => {
                log::debug!("Not connected, dropping {}", message.event.kind());
            }
            ChannelState::Connecting => self.pending.push(message),
            ChannelState::Subscribed => self.queue_broadcast(&message),
        }
    }

    pub fn broadcast_stroke(&mut self, stroke: &Stroke) {
        self.broadcast(BoardEvent::StrokeAdded {
            stroke: stroke.clone(),
        });
    }

    pub fn broadcast_stroke_update(&mut self, id: &str, points: &[f64]) {
        self.broadcast(BoardEvent::StrokeUpdated {
            id: id.to_string(),
            points: points.to_vec(),
        });
    }

    pub fn broadcast_remove_strokes(&mut self, ids: Vec<String>) {
        self.broadcast(BoardEvent::StrokesRemoved { ids });
    }

    pub fn broadcast_shape(&mut self, shape: &Shape) {
        self.broadcast(BoardEvent::ShapeAdded {
            shape: shape.clone(),
        });
    }

    pub fn broadcast_shape_update(&mut self, id: &str, x: f64, y: f64) {
        self.broadcast(BoardEvent::ShapeUpdated {
            id: id.to_string(),
            x,
            y,
        });
    }

    pub fn broadcast_remove_shapes(&mut self, ids: Vec<String>) {
        self.broadcast(BoardEvent::ShapesRemoved { ids });
    }

    pub fn broadcast_mindmap_nodes(&mut self, nodes: &[TextNode]) {
        self.broadcast(BoardEvent::MindmapNodesAdded {
            nodes: nodes.to_vec(),
        });
    }

    pub fn broadcast_remove_mindmap_node(&mut self, id: &str) {
        self.broadcast(BoardEvent::MindmapNodeRemoved { id: id.to_string() });
    }

    // --- Cursor ---

    /// Offer the local pointer position. Sent at most once per throttle
    /// interval; a position arriving during the cool-down is sent by a later
    /// [`RealtimeTransport::tick`].
    pub fn broadcast_cursor(&mut self, store: &mut BoardStore, position: Point, now: Duration) {
        if let Some(position) = self.cursor_throttle.offer(position, now) {
            self.send_cursor(store, position);
        }
    }

    /// Flush a pending cursor position once its interval has elapsed.
    pub fn tick(&mut self, store: &mut BoardStore, now: Duration) {
        if let Some(position) = self.cursor_throttle.tick(now) {
            self.send_cursor(store, position);
        }
    }

    /// Tell the others this client's pointer left the board. Bypasses the
    /// throttle and cancels any pending position.
    pub fn clear_cursor(&mut self, store: &mut BoardStore) {
        self.cursor_throttle.cancel();
        store.set_cursor(&self.session_id, None);
        self.broadcast(BoardEvent::CursorMoved { cursor: None });
    }

    fn send_cursor(&mut self, store: &mut BoardStore, position: Point) {
        let cursor = CursorData {
            x: position.x,
            y: position.y,
            color: self.cursor_color.clone(),
            display_name: self.display_name.clone(),
        };
        store.set_cursor(&self.session_id, Some(cursor.clone()));
        self.broadcast(BoardEvent::CursorMoved {
            cursor: Some(cursor),
        });
    }

    // --- Frames ---

    fn queue_broadcast(&mut self, message: &WireMessage) {
        match message.to_value() {
            Ok(value) => self.queue_frame(&ClientMessage::Broadcast { message: value }),
            Err(e) => log::warn!("Failed to encode {}: {}", message.event.kind(), e),
        }
    }

    fn queue_frame(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::warn!("Failed to encode relay frame: {}", e),
        }
    }

    /// Take pending outgoing frames (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing frames.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }
}

impl Default for RealtimeTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

fn color_for(session_id: &str) -> &'static str {
    let sum = session_id.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize));
    CURSOR_COLORS[sum % CURSOR_COLORS.len()]
}
