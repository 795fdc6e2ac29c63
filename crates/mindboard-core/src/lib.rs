//! Mindboard Core Library
//!
//! Platform-agnostic state, realtime reconciliation and gesture handling for
//! the Mindboard collaborative whiteboard.

pub mod board;
pub mod collaboration;
pub mod controller;
pub mod generate;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod selection;
pub mod shapes;
pub mod storage;
pub mod sync;
pub mod throttle;
pub mod tools;

pub use board::{BoardContent, BoardStore, MAX_UNDO_HISTORY};
pub use collaboration::{ChannelState, RealtimeTransport, TransportConfig, channel_name};
pub use controller::{
    Controller, ControllerConfig, ERASER_RADIUS, ExpandRequest, Gesture, MOVE_HIT_RADIUS,
};
pub use generate::{
    GenerationError, GenerationGate, MindmapGenerator, apply_generated, run_generation,
};
pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use layout::layout;
pub use selection::{MultiMoveState, Selection, SelectionRect};
pub use shapes::{CursorData, DEFAULT_STROKE_COLOR, EntityId, Shape, ShapeKind, Stroke, TextNode};
pub use storage::{
    BoardRepository, MemoryStorage, SaveRequest, StorageError, StorageResult, Visibility,
};
pub use sync::{BoardEvent, ConnectionState, PlatformWebSocket, SyncError, SyncEvent, WireMessage};
pub use throttle::{CURSOR_THROTTLE_INTERVAL, Clock, Throttle};
pub use tools::ToolKind;
