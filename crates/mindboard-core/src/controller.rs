//! Interaction controller: turns pointer and keyboard gestures into store
//! mutations and broadcasts.
//!
//! Every local change follows the same order: checkpoint the store for undo,
//! mutate it, then hand the matching event to the transport.

use crate::board::BoardStore;
use crate::collaboration::RealtimeTransport;
use crate::geometry::normalized_rect;
use crate::input::{KeyEvent, Modifiers, MouseButton, PointerEvent, Shortcut};
use crate::selection::{MultiMoveState, Selection, SelectionRect};
use crate::shapes::{DEFAULT_STROKE_COLOR, EntityId, Shape, ShapeKind, Stroke};
use crate::tools::ToolKind;
use kurbo::{Point, Rect};
use std::time::Duration;

/// Distance within which the eraser removes a stroke.
pub const ERASER_RADIUS: f64 = 24.0;
/// Distance within which a press on a selected stroke starts a move. Also the
/// half-size of the box a click-sized selection expands to.
pub const MOVE_HIT_RADIUS: f64 = 12.0;

/// Tunables for [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub eraser_radius: f64,
    pub move_hit_radius: f64,
    /// Colour of new strokes and shape outlines.
    pub stroke_color: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            eraser_radius: ERASER_RADIUS,
            move_hit_radius: MOVE_HIT_RADIUS,
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
        }
    }
}

/// The gesture in progress. Exactly one is active at a time.
#[derive(Debug, Clone, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Pen stroke being drawn (flattened points).
    Drawing { points: Vec<f64> },
    /// Eraser held down. `checkpointed` records whether this gesture already
    /// pushed its undo snapshot.
    Erasing { checkpointed: bool },
    /// Shift-drag rubber band.
    Selecting(SelectionRect),
    /// Dragging the current selection.
    Moving(MultiMoveState),
    /// Shape tool drag.
    DraftingShape {
        kind: ShapeKind,
        start: Point,
        rect: Rect,
    },
    /// Primary button held on a mindmap node.
    PressingNode { node_id: EntityId, text: String },
}

/// Request to generate another mindmap round from a clicked node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandRequest {
    pub node_id: EntityId,
    pub keyword: String,
}

/// Gesture state machine for one board view.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    config: ControllerConfig,
    gesture: Gesture,
    selection: Selection,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            gesture: Gesture::Idle,
            selection: Selection::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Points of the stroke being drawn, for live preview.
    pub fn draft_points(&self) -> Option<&[f64]> {
        match &self.gesture {
            Gesture::Drawing { points } => Some(points),
            _ => None,
        }
    }

    /// Shape being dragged out, for live preview.
    pub fn draft_shape(&self) -> Option<(ShapeKind, Rect)> {
        match &self.gesture {
            Gesture::DraftingShape { kind, rect, .. } => Some((*kind, *rect)),
            _ => None,
        }
    }

    /// Rubber band being dragged, for live preview.
    pub fn selection_rect(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::Selecting(rect) => Some(rect.to_rect()),
            _ => None,
        }
    }

    /// Dispatch a pointer event. `now` drives the cursor throttle.
    pub fn handle_pointer_event(
        &mut self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
        event: PointerEvent,
        now: Duration,
    ) -> Option<ExpandRequest> {
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } => {
                self.pointer_down(store, transport, position, button, modifiers);
                None
            }
            PointerEvent::Move { position } => {
                self.pointer_move(store, transport, position, now);
                None
            }
            PointerEvent::Up => self.pointer_up(store, transport),
            PointerEvent::Leave => {
                self.pointer_leave(store, transport);
                None
            }
        }
    }

    /// Start a gesture.
    pub fn pointer_down(
        &mut self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    ) {
        if button != MouseButton::Left {
            return;
        }

        if let Some(node) = store.text_node_at(position) {
            self.gesture = Gesture::PressingNode {
                node_id: node.id.clone(),
                text: node.text.clone(),
            };
            return;
        }

        let tool = store.tool();
        if tool == ToolKind::Eraser && !modifiers.shift {
            let mut checkpointed = false;
            erase_at(store, transport, position, self.config.eraser_radius, &mut checkpointed);
            self.gesture = Gesture::Erasing { checkpointed };
            return;
        }

        if modifiers.shift {
            self.gesture = Gesture::Selecting(SelectionRect::new(position));
            return;
        }

        if !self.selection.is_empty() && self.hits_selection(store, position) {
            store.push_undo_snapshot();
            let state = MultiMoveState::capture(position, &self.selection, store);
            self.gesture = Gesture::Moving(state);
            return;
        }

        self.selection.clear();
        if let Some(kind) = tool.shape_kind() {
            self.gesture = Gesture::DraftingShape {
                kind,
                start: position,
                rect: Rect::from_origin_size(position, (0.0, 0.0)),
            };
        } else if tool == ToolKind::Pen {
            self.gesture = Gesture::Drawing {
                points: vec![position.x, position.y],
            };
        }
    }

    /// Whether the topmost stroke or shape under the point is selected.
    fn hits_selection(&self, store: &BoardStore, position: Point) -> bool {
        let stroke_hit = store
            .topmost_stroke_near(position, self.config.move_hit_radius)
            .is_some_and(|s| self.selection.contains_stroke(&s.id));
        let shape_hit = store
            .topmost_shape_at(position)
            .is_some_and(|s| self.selection.contains_shape(&s.id));
        stroke_hit || shape_hit
    }

    /// Continue the gesture and offer the position to the cursor throttle.
    pub fn pointer_move(
        &mut self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
        position: Point,
        now: Duration,
    ) {
        transport.broadcast_cursor(store, position, now);

        match &mut self.gesture {
            Gesture::Moving(state) => {
                state.current_point = position;
                let delta = state.delta();
                for (id, original) in &state.original_points {
                    let points = Stroke::translated_points(original, delta);
                    store.update_stroke(id, points.clone());
                    transport.broadcast_stroke_update(id, &points);
                }
                for (id, original) in &state.original_positions {
                    let moved = *original + delta;
                    store.update_shape(id, moved.x, moved.y);
                    transport.broadcast_shape_update(id, moved.x, moved.y);
                }
            }
            Gesture::Selecting(rect) => rect.current = position,
            Gesture::DraftingShape { start, rect, .. } => {
                *rect = normalized_rect(*start, position);
            }
            Gesture::Erasing { checkpointed } => {
                erase_at(store, transport, position, self.config.eraser_radius, checkpointed);
            }
            Gesture::Drawing { points } => {
                points.push(position.x);
                points.push(position.y);
            }
            Gesture::PressingNode { .. } | Gesture::Idle => {}
        }
    }

    /// Finish the gesture. Releasing over a pressed mindmap node asks for
    /// that node to be expanded.
    pub fn pointer_up(
        &mut self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
    ) -> Option<ExpandRequest> {
        match std::mem::take(&mut self.gesture) {
            Gesture::PressingNode { node_id, text } => {
                return Some(ExpandRequest {
                    node_id,
                    keyword: text,
                });
            }
            Gesture::DraftingShape { kind, rect, .. } => {
                self.commit_shape(store, transport, kind, rect);
            }
            Gesture::Selecting(rect) => {
                self.selection = rect.select(store, self.config.move_hit_radius);
            }
            Gesture::Drawing { points } => self.commit_stroke(store, transport, points),
            Gesture::Moving(_) | Gesture::Erasing { .. } | Gesture::Idle => {}
        }
        None
    }

    /// The pointer left the board: clear this client's cursor everywhere and
    /// end the gesture. A stroke in progress is committed; everything else is
    /// dropped.
    pub fn pointer_leave(&mut self, store: &mut BoardStore, transport: &mut RealtimeTransport) {
        transport.clear_cursor(store);
        if let Gesture::Drawing { points } = std::mem::take(&mut self.gesture) {
            self.commit_stroke(store, transport, points);
        }
    }

    /// Handle a key press. Returns whether the board changed.
    pub fn key_down(&mut self, store: &mut BoardStore, event: &KeyEvent) -> bool {
        match event.shortcut() {
            Some(Shortcut::Undo) => store.undo(),
            Some(Shortcut::Redo) => store.redo(),
            None => false,
        }
    }

    /// Delete a mindmap node (context menu action).
    pub fn delete_text_node(
        &mut self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
        id: &str,
    ) -> bool {
        if !store.text_nodes().iter().any(|n| n.id == id) {
            return false;
        }
        store.push_undo_snapshot();
        store.remove_text_node(id);
        transport.broadcast_remove_mindmap_node(id);
        true
    }

    fn commit_stroke(
        &self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
        points: Vec<f64>,
    ) {
        if points.len() < Stroke::MIN_POINTS * 2 {
            return;
        }
        store.push_undo_snapshot();
        let stroke = Stroke::new(points, self.config.stroke_color.clone());
        transport.broadcast_stroke(&stroke);
        store.add_stroke(stroke);
    }

    fn commit_shape(
        &self,
        store: &mut BoardStore,
        transport: &mut RealtimeTransport,
        kind: ShapeKind,
        rect: Rect,
    ) {
        let mut shape = Shape::new(kind, rect);
        if !shape.meets_min_size() {
            return;
        }
        shape.stroke_color = self.config.stroke_color.clone();
        store.push_undo_snapshot();
        transport.broadcast_shape(&shape);
        store.add_shape(shape);
    }
}

/// Remove every stroke and shape under the eraser, checkpointing once per
/// gesture on the first hit.
fn erase_at(
    store: &mut BoardStore,
    transport: &mut RealtimeTransport,
    position: Point,
    radius: f64,
    checkpointed: &mut bool,
) {
    let stroke_ids = store.strokes_near(position, radius);
    let shape_ids = store.shapes_at_point(position);
    if stroke_ids.is_empty() && shape_ids.is_empty() {
        return;
    }
    if !*checkpointed {
        store.push_undo_snapshot();
        *checkpointed = true;
    }
    if !stroke_ids.is_empty() {
        store.remove_strokes(&stroke_ids);
        transport.broadcast_remove_strokes(stroke_ids);
    }
    if !shape_ids.is_empty() {
        store.remove_shapes(&shape_ids);
        transport.broadcast_remove_shapes(shape_ids);
    }
}
