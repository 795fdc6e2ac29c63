//! Rubber-band selection and selection moves.

use crate::board::BoardStore;
use crate::geometry::{box_around, normalized_rect};
use crate::shapes::EntityId;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;

/// Below this size in both dimensions a rubber band counts as a click.
pub const MIN_SELECTION_SIZE: f64 = 4.0;

/// Ids of the selected strokes and shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub strokes: Vec<EntityId>,
    pub shapes: Vec<EntityId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.shapes.is_empty()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.shapes.clear();
    }

    pub fn contains_stroke(&self, id: &str) -> bool {
        self.strokes.iter().any(|s| s == id)
    }

    pub fn contains_shape(&self, id: &str) -> bool {
        self.shapes.iter().any(|s| s == id)
    }
}

/// Selection rectangle state for rubber-band selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    /// Starting point in board coordinates.
    pub start: Point,
    /// Current point in board coordinates.
    pub current: Point,
}

impl SelectionRect {
    pub fn new(start: Point) -> Self {
        Self {
            start,
            current: start,
        }
    }

    /// Get the selection rectangle as a Rect.
    pub fn to_rect(&self) -> Rect {
        normalized_rect(self.start, self.current)
    }

    /// Rectangle used for hit-testing. A near-click becomes a square of
    /// `pad` around the midpoint so a single click can pick up a thin stroke.
    pub fn hit_rect(&self, pad: f64) -> Rect {
        let rect = self.to_rect();
        if rect.width() < MIN_SELECTION_SIZE && rect.height() < MIN_SELECTION_SIZE {
            box_around(self.start.midpoint(self.current), pad)
        } else {
            rect
        }
    }

    /// Strokes and shapes whose bounding boxes touch the hit rectangle.
    pub fn select(&self, store: &BoardStore, pad: f64) -> Selection {
        let rect = self.hit_rect(pad);
        Selection {
            strokes: store.strokes_in_rect(rect),
            shapes: store.shapes_in_rect(rect),
        }
    }
}

/// State of an in-progress move of the selection.
///
/// Positions are always recomputed from the originals captured at press time,
/// so any sequence of moves ending at the same point gives the same result.
#[derive(Debug, Clone)]
pub struct MultiMoveState {
    /// Starting point of the drag.
    pub start_point: Point,
    /// Current point of the drag.
    pub current_point: Point,
    /// Original stroke points (stroke id -> flattened points).
    pub original_points: HashMap<EntityId, Vec<f64>>,
    /// Original shape positions (shape id -> top-left corner).
    pub original_positions: HashMap<EntityId, Point>,
}

impl MultiMoveState {
    /// Capture the originals of every selected entity still on the board.
    pub fn capture(start_point: Point, selection: &Selection, store: &BoardStore) -> Self {
        let original_points = selection
            .strokes
            .iter()
            .filter_map(|id| store.stroke(id).map(|s| (id.clone(), s.points.clone())))
            .collect();
        let original_positions = selection
            .shapes
            .iter()
            .filter_map(|id| store.shape(id).map(|s| (id.clone(), s.position())))
            .collect();
        Self {
            start_point,
            current_point: start_point,
            original_points,
            original_positions,
        }
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Shape, ShapeKind, Stroke};

    #[test]
    fn test_selection_rect_normalizes() {
        let mut rect = SelectionRect::new(Point::new(50.0, 50.0));
        rect.current = Point::new(10.0, 20.0);
        assert_eq!(rect.to_rect(), Rect::new(10.0, 20.0, 50.0, 50.0));
        assert_eq!(rect.hit_rect(12.0), rect.to_rect());
    }

    #[test]
    fn test_click_expands_to_pad() {
        let mut rect = SelectionRect::new(Point::new(100.0, 100.0));
        rect.current = Point::new(102.0, 101.0);
        assert_eq!(rect.hit_rect(12.0), Rect::new(89.0, 88.5, 113.0, 112.5));
    }

    #[test]
    fn test_thin_band_is_not_expanded() {
        let mut rect = SelectionRect::new(Point::new(0.0, 0.0));
        rect.current = Point::new(50.0, 2.0);
        assert_eq!(rect.hit_rect(12.0), Rect::new(0.0, 0.0, 50.0, 2.0));
    }

    #[test]
    fn test_select_and_capture() {
        let mut store = BoardStore::new();
        let mut stroke = Stroke::new(vec![0.0, 0.0, 10.0, 10.0], "#000");
        stroke.id = "s1".into();
        store.add_stroke(stroke);
        let mut shape = Shape::new(ShapeKind::Rectangle, Rect::new(5.0, 5.0, 15.0, 15.0));
        shape.id = "r1".into();
        store.add_shape(shape);

        let mut rect = SelectionRect::new(Point::new(-1.0, -1.0));
        rect.current = Point::new(20.0, 20.0);
        let mut selection = rect.select(&store, 12.0);
        assert_eq!(selection.strokes, vec!["s1".to_string()]);
        assert_eq!(selection.shapes, vec!["r1".to_string()]);

        selection.strokes.push("gone".into());
        let state = MultiMoveState::capture(Point::new(1.0, 1.0), &selection, &store);
        assert_eq!(state.original_points.len(), 1);
        assert_eq!(state.original_positions["r1"], Point::new(5.0, 5.0));
        assert_eq!(state.delta(), Vec2::ZERO);
    }
}
