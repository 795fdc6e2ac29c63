//! Drawing tools.

use crate::shapes::ShapeKind;
use serde::{Deserialize, Serialize};

/// Available tools. The selection is local to each client and never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pen,
    Eraser,
    Rectangle,
    Ellipse,
    Triangle,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Pen,
        ToolKind::Eraser,
        ToolKind::Rectangle,
        ToolKind::Ellipse,
        ToolKind::Triangle,
    ];

    /// Shape produced by dragging with this tool, if it is a shape tool.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Rectangle => Some(ShapeKind::Rectangle),
            ToolKind::Ellipse => Some(ShapeKind::Ellipse),
            ToolKind::Triangle => Some(ShapeKind::Triangle),
            ToolKind::Pen | ToolKind::Eraser => None,
        }
    }

    pub fn is_shape_tool(self) -> bool {
        self.shape_kind().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Pen => "pen",
            ToolKind::Eraser => "eraser",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Ellipse => "ellipse",
            ToolKind::Triangle => "triangle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool_is_pen() {
        assert_eq!(ToolKind::default(), ToolKind::Pen);
    }

    #[test]
    fn test_shape_tools() {
        let shape_tools: Vec<_> = ToolKind::ALL.iter().filter(|t| t.is_shape_tool()).collect();
        assert_eq!(shape_tools.len(), 3);
        assert_eq!(ToolKind::Triangle.shape_kind(), Some(ShapeKind::Triangle));
        assert_eq!(ToolKind::Eraser.shape_kind(), None);
    }

    #[test]
    fn test_serde_names() {
        for tool in ToolKind::ALL {
            let json = serde_json::to_string(&tool).unwrap();
            assert_eq!(json, format!("\"{}\"", tool.name()));
        }
    }
}
