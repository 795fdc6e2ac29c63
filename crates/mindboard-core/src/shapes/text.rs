//! Mindmap text node.

use super::{EntityId, new_entity_id};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Rendered width of every text node.
pub const NODE_WIDTH: f64 = 100.0;
/// Rendered height of every text node.
pub const NODE_HEIGHT: f64 = 28.0;

fn new_node_id() -> EntityId {
    new_entity_id("mindmap")
}

/// A short label placed on the board, usually produced by mindmap generation.
/// Nodes never move once placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(default = "new_node_id")]
    pub id: EntityId,
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl TextNode {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: new_node_id(),
            text: text.into(),
            x,
            y,
        }
    }

    /// Fixed-size footprint.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + NODE_WIDTH, self.y + NODE_HEIGHT)
    }

    /// Half-open containment: the right and bottom edges belong to the
    /// neighbouring cell.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + NODE_WIDTH
            && point.y >= self.y
            && point.y < self.y + NODE_HEIGHT
    }

    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && self.x.is_finite() && self.y.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let node = TextNode::new("idea", 20.0, 20.0);
        assert!(node.contains(Point::new(20.0, 20.0)));
        assert!(node.contains(Point::new(119.0, 47.0)));
        assert!(!node.contains(Point::new(120.0, 30.0)));
        assert!(!node.contains(Point::new(50.0, 48.0)));
    }
}
