//! Board state store: the single source of truth for what is on the board.

use crate::geometry::rects_intersect;
use crate::shapes::{CursorData, EntityId, Shape, Stroke, TextNode, new_entity_id};
use crate::tools::ToolKind;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maximum number of undo (and redo) states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Everything that is persisted and restored by undo/redo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardContent {
    #[serde(default, alias = "lines")]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub text_nodes: Vec<TextNode>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl BoardContent {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.text_nodes.is_empty() && self.shapes.is_empty()
    }

    /// Give every entity a non-empty id that is unique within its collection.
    /// Returns the number of ids that had to be reassigned.
    pub fn normalize_ids(&mut self) -> usize {
        let mut fixed = 0;
        fixed += normalize(self.strokes.iter_mut().map(|s| &mut s.id), "line");
        fixed += normalize(self.shapes.iter_mut().map(|s| &mut s.id), "shape");
        fixed += normalize(self.text_nodes.iter_mut().map(|n| &mut n.id), "mindmap");
        fixed
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn normalize<'a>(ids: impl Iterator<Item = &'a mut EntityId>, prefix: &str) -> usize {
    let mut seen = HashSet::new();
    let mut fixed = 0;
    for id in ids {
        if id.is_empty() || !seen.insert(id.clone()) {
            *id = new_entity_id(prefix);
            seen.insert(id.clone());
            fixed += 1;
        }
    }
    fixed
}

/// Local board state: entities, remote cursors, the active tool and undo
/// history.
///
/// Every mutation is synchronous. Mutations applied on behalf of remote peers
/// go through the same methods as local ones; only local actions call
/// [`BoardStore::push_undo_snapshot`] first.
#[derive(Debug, Clone, Default)]
pub struct BoardStore {
    content: BoardContent,
    cursors: HashMap<String, CursorData>,
    tool: ToolKind,
    current_board_id: Option<String>,
    undo_stack: Vec<BoardContent>,
    redo_stack: Vec<BoardContent>,
}

impl BoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with content (ids are normalized).
    pub fn with_content(content: BoardContent) -> Self {
        let mut store = Self::new();
        store.set_board_content(content);
        store
    }

    // --- strokes ---

    /// Append a stroke. An empty id is replaced with a fresh one; a stroke
    /// whose id is already present is ignored. Returns whether it was added.
    pub fn add_stroke(&mut self, mut stroke: Stroke) -> bool {
        if stroke.id.is_empty() {
            stroke.id = new_entity_id("line");
        } else if self.stroke(&stroke.id).is_some() {
            log::debug!("Ignoring duplicate stroke {}", stroke.id);
            return false;
        }
        self.content.strokes.push(stroke);
        self.redo_stack.clear();
        true
    }

    /// Replace all points of a stroke.
    pub fn update_stroke(&mut self, id: &str, points: Vec<f64>) -> bool {
        match self.content.strokes.iter_mut().find(|s| s.id == id) {
            Some(stroke) => {
                stroke.points = points;
                self.redo_stack.clear();
                true
            }
            None => false,
        }
    }

    /// Remove every stroke whose id is listed. Returns how many were removed.
    pub fn remove_strokes<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let before = self.content.strokes.len();
        self.content.strokes.retain(|s| !ids.contains(s.id.as_str()));
        self.redo_stack.clear();
        before - self.content.strokes.len()
    }

    // --- shapes ---

    /// Append a shape, with the same id rules as [`BoardStore::add_stroke`].
    pub fn add_shape(&mut self, mut shape: Shape) -> bool {
        if shape.id.is_empty() {
            shape.id = new_entity_id("shape");
        } else if self.shape(&shape.id).is_some() {
            log::debug!("Ignoring duplicate shape {}", shape.id);
            return false;
        }
        if shape.stroke_color.is_empty() {
            shape.stroke_color = crate::shapes::DEFAULT_STROKE_COLOR.to_string();
        }
        self.content.shapes.push(shape);
        self.redo_stack.clear();
        true
    }

    /// Move a shape's top-left corner.
    pub fn update_shape(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.content.shapes.iter_mut().find(|s| s.id == id) {
            Some(shape) => {
                shape.x = x;
                shape.y = y;
                self.redo_stack.clear();
                true
            }
            None => false,
        }
    }

    pub fn remove_shapes<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let before = self.content.shapes.len();
        self.content.shapes.retain(|s| !ids.contains(s.id.as_str()));
        self.redo_stack.clear();
        before - self.content.shapes.len()
    }

    // --- text nodes ---

    /// Append a batch of text nodes, skipping ids already on the board.
    /// Leaves the redo stack alone.
    pub fn add_text_nodes(&mut self, nodes: Vec<TextNode>) -> usize {
        let mut added = 0;
        for node in nodes {
            if self.content.text_nodes.iter().any(|n| n.id == node.id) {
                log::debug!("Ignoring duplicate text node {}", node.id);
                continue;
            }
            self.content.text_nodes.push(node);
            added += 1;
        }
        added
    }

    /// Replace the whole text node collection.
    pub fn set_text_nodes(&mut self, nodes: Vec<TextNode>) {
        self.content.text_nodes = nodes;
    }

    /// Remove one text node. Returns whether it existed.
    pub fn remove_text_node(&mut self, id: &str) -> bool {
        let before = self.content.text_nodes.len();
        let remaining: Vec<TextNode> = self
            .content
            .text_nodes
            .iter()
            .filter(|n| n.id != id)
            .cloned()
            .collect();
        let removed = remaining.len() != before;
        self.set_text_nodes(remaining);
        removed
    }

    // --- cursors ---

    /// Upsert a peer's cursor, or delete it with `None`.
    pub fn set_cursor(&mut self, peer_id: &str, cursor: Option<CursorData>) {
        match cursor {
            Some(cursor) => {
                self.cursors.insert(peer_id.to_string(), cursor);
            }
            None => {
                self.cursors.remove(peer_id);
            }
        }
    }

    pub fn clear_cursors(&mut self) {
        self.cursors.clear();
    }

    // --- history ---

    /// Checkpoint the current content before a local change.
    pub fn push_undo_snapshot(&mut self) {
        self.undo_stack.push(self.content.clone());
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the last change.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.content, snapshot);
        self.redo_stack.push(current);
        if self.redo_stack.len() > MAX_UNDO_HISTORY {
            self.redo_stack.remove(0);
        }
        true
    }

    /// Redo the last undone change.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.content, snapshot);
        self.undo_stack.push(current);
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    // --- bulk ---

    /// Replace everything on the board, e.g. after loading a saved board.
    /// Undo history is kept so a load can itself be undone.
    pub fn set_board_content(&mut self, mut content: BoardContent) {
        let fixed = content.normalize_ids();
        if fixed > 0 {
            log::debug!("Reassigned {} missing or duplicate ids", fixed);
        }
        self.content = content;
        self.redo_stack.clear();
    }

    // --- accessors ---

    pub fn strokes(&self) -> &[Stroke] {
        &self.content.strokes
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.content.shapes
    }

    pub fn text_nodes(&self) -> &[TextNode] {
        &self.content.text_nodes
    }

    pub fn cursors(&self) -> &HashMap<String, CursorData> {
        &self.cursors
    }

    /// Snapshot of the persistable content.
    pub fn content(&self) -> BoardContent {
        self.content.clone()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    pub fn current_board_id(&self) -> Option<&str> {
        self.current_board_id.as_deref()
    }

    pub fn set_current_board_id(&mut self, id: Option<String>) {
        self.current_board_id = id;
    }

    // --- queries ---

    pub fn stroke(&self, id: &str) -> Option<&Stroke> {
        self.content.strokes.iter().find(|s| s.id == id)
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.content.shapes.iter().find(|s| s.id == id)
    }

    /// Topmost (last placed) text node whose footprint contains the point.
    pub fn text_node_at(&self, point: Point) -> Option<&TextNode> {
        self.content.text_nodes.iter().rev().find(|n| n.contains(point))
    }

    /// Topmost (last added) stroke passing within `radius` of the point.
    pub fn topmost_stroke_near(&self, point: Point, radius: f64) -> Option<&Stroke> {
        self.content
            .strokes
            .iter()
            .rev()
            .find(|s| s.hit_test(point, radius))
    }

    /// Topmost (last added) shape containing the point.
    pub fn topmost_shape_at(&self, point: Point) -> Option<&Shape> {
        self.content.shapes.iter().rev().find(|s| s.contains(point))
    }

    /// Ids of every stroke passing within `radius` of the point.
    pub fn strokes_near(&self, point: Point, radius: f64) -> Vec<EntityId> {
        self.content
            .strokes
            .iter()
            .filter(|s| s.hit_test(point, radius))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of every shape containing the point.
    pub fn shapes_at_point(&self, point: Point) -> Vec<EntityId> {
        self.content
            .shapes
            .iter()
            .filter(|s| s.contains(point))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of strokes whose bounding box touches the rectangle.
    pub fn strokes_in_rect(&self, rect: Rect) -> Vec<EntityId> {
        self.content
            .strokes
            .iter()
            .filter(|s| s.bounds().is_some_and(|b| rects_intersect(rect, b)))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of shapes whose bounding box touches the rectangle.
    pub fn shapes_in_rect(&self, rect: Rect) -> Vec<EntityId> {
        self.content
            .shapes
            .iter()
            .filter(|s| rects_intersect(rect, s.bounds()))
            .map(|s| s.id.clone())
            .collect()
    }
}
