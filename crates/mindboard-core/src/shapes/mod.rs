//! Drawable entities of a board: strokes, shapes and mindmap text nodes.

mod stroke;
mod text;

pub use stroke::Stroke;
pub use text::{NODE_HEIGHT, NODE_WIDTH, TextNode};

use crate::geometry::{point_in_ellipse, point_in_rect, point_in_triangle};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Colour used for strokes and shape outlines when none is given.
pub const DEFAULT_STROKE_COLOR: &str = "#1e293b";

/// Identifier of a stroke, shape or text node. Unique within its collection.
pub type EntityId = String;

/// Generate a fresh entity id with a kind prefix, e.g. `line-3f2a...`.
pub fn new_entity_id(prefix: &str) -> EntityId {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn new_shape_id() -> EntityId {
    new_entity_id("shape")
}

fn default_stroke_color() -> String {
    DEFAULT_STROKE_COLOR.to_string()
}

/// A remote collaborator's pointer. Ephemeral: never persisted, never part of
/// undo history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorData {
    pub x: f64,
    pub y: f64,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CursorData {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_well_formed(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Label drawn next to the cursor: the local part of an email-like display
    /// name, or the last six characters of the peer id when there is none.
    pub fn label(&self, peer_id: &str) -> String {
        match self.display_name.as_deref() {
            Some(name) => name.split('@').next().unwrap_or(name).to_string(),
            None => {
                let skip = peer_id.chars().count().saturating_sub(6);
                peer_id.chars().skip(skip).collect()
            }
        }
    }
}

/// Kind of parametric shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[serde(alias = "rect")]
    Rectangle,
    Ellipse,
    Triangle,
}

/// A rectangle, ellipse or triangle defined by its bounding box.
///
/// `x`/`y` is always the top-left corner of the box, whatever the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    #[serde(default = "new_shape_id")]
    pub id: EntityId,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_stroke_color", alias = "stroke")]
    pub stroke_color: String,
}

impl Shape {
    /// Smallest width and height a drafted shape must reach to be committed.
    pub const MIN_SIZE: f64 = 2.0;

    /// Create a shape with a fresh id and the default outline colour.
    pub fn new(kind: ShapeKind, rect: Rect) -> Self {
        Self {
            id: new_shape_id(),
            kind,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            stroke_color: default_stroke_color(),
        }
    }

    /// Bounding box in board coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Top-left corner.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Exact containment test for the shape's outline kind.
    pub fn contains(&self, point: Point) -> bool {
        let (x, y, w, h) = (self.x, self.y, self.width, self.height);
        match self.kind {
            ShapeKind::Rectangle => point_in_rect(point, x, y, w, h),
            ShapeKind::Ellipse => point_in_ellipse(point, x, y, w, h),
            ShapeKind::Triangle => point_in_triangle(point, x, y, w, h),
        }
    }

    /// Whether the box is large enough to be committed.
    pub fn meets_min_size(&self) -> bool {
        self.width >= Self::MIN_SIZE && self.height >= Self::MIN_SIZE
    }

    /// Check that every number is finite and the size is not negative.
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_label() {
        let mut cursor = CursorData {
            x: 0.0,
            y: 0.0,
            color: "#f00".into(),
            display_name: Some("ada@example.com".into()),
        };
        assert_eq!(cursor.label("peer-123456789"), "ada");
        cursor.display_name = None;
        assert_eq!(cursor.label("peer-123456789"), "456789");
        assert_eq!(cursor.label("abc"), "abc");
    }

    #[test]
    fn test_shape_new_assigns_id_and_color() {
        let a = Shape::new(ShapeKind::Rectangle, Rect::new(1.0, 2.0, 11.0, 7.0));
        let b = Shape::new(ShapeKind::Rectangle, Rect::new(1.0, 2.0, 11.0, 7.0));
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("shape-"));
        assert_eq!(a.stroke_color, DEFAULT_STROKE_COLOR);
        assert_eq!((a.x, a.y, a.width, a.height), (1.0, 2.0, 10.0, 5.0));
    }

    #[test]
    fn test_shape_contains_per_kind() {
        let rect = Rect::new(0.0, 0.0, 20.0, 20.0);
        let corner = Point::new(1.0, 1.0);
        assert!(Shape::new(ShapeKind::Rectangle, rect).contains(corner));
        assert!(!Shape::new(ShapeKind::Ellipse, rect).contains(corner));
        assert!(!Shape::new(ShapeKind::Triangle, rect).contains(corner));
        let center = Point::new(10.0, 12.0);
        assert!(Shape::new(ShapeKind::Ellipse, rect).contains(center));
        assert!(Shape::new(ShapeKind::Triangle, rect).contains(center));
    }

    #[test]
    fn test_shape_min_size() {
        let tiny = Shape::new(ShapeKind::Ellipse, Rect::new(10.0, 10.0, 11.0, 11.0));
        assert!(!tiny.meets_min_size());
        let ok = Shape::new(ShapeKind::Ellipse, Rect::new(10.0, 10.0, 12.0, 12.0));
        assert!(ok.meets_min_size());
    }

    #[test]
    fn test_shape_wire_format() {
        let json = r#"{"id":"s1","type":"triangle","x":1,"y":2,"width":3,"height":4}"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(shape.kind, ShapeKind::Triangle);
        assert_eq!(shape.stroke_color, DEFAULT_STROKE_COLOR);

        let out = serde_json::to_value(&shape).unwrap();
        assert_eq!(out["type"], "triangle");
        assert_eq!(out["strokeColor"], DEFAULT_STROKE_COLOR);
    }

    #[test]
    fn test_shape_legacy_fields() {
        let json = r##"{"type":"rect","x":0,"y":0,"width":5,"height":5,"stroke":"#ff0000"}"##;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(shape.kind, ShapeKind::Rectangle);
        assert_eq!(shape.stroke_color, "#ff0000");
        assert!(shape.id.starts_with("shape-"));
    }
}
