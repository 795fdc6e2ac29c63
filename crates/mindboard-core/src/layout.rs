//! Grid placement for generated mindmap nodes.
//!
//! Nodes fill a fixed-width grid anchored at the top-left of the board, row by
//! row. A new batch continues from the number of nodes already placed, so
//! successive generations never overlap earlier ones.

use crate::shapes::{NODE_HEIGHT, NODE_WIDTH, TextNode};

pub const GRID_LEFT: f64 = 20.0;
pub const GRID_TOP: f64 = 20.0;
/// Space between neighbouring nodes.
pub const GAP: f64 = 8.0;
/// Nodes per row.
pub const COLS: usize = 5;

/// Top-left corner of the grid cell at a logical index.
pub fn cell_origin(index: usize) -> (f64, f64) {
    let col = index % COLS;
    let row = index / COLS;
    (
        GRID_LEFT + col as f64 * (NODE_WIDTH + GAP),
        GRID_TOP + row as f64 * (NODE_HEIGHT + GAP),
    )
}

/// Place `texts` in the grid starting after `existing_count` nodes. Every node
/// gets a fresh id.
pub fn layout<S: AsRef<str>>(texts: &[S], existing_count: usize) -> Vec<TextNode> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let (x, y) = cell_origin(existing_count + i);
            TextNode::new(text.as_ref(), x, y)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_row() {
        let nodes = layout(&["a", "b", "c"], 0);
        assert_eq!((nodes[0].x, nodes[0].y), (20.0, 20.0));
        assert_eq!((nodes[1].x, nodes[1].y), (128.0, 20.0));
        assert_eq!((nodes[2].x, nodes[2].y), (236.0, 20.0));
    }

    #[test]
    fn test_wraps_after_cols() {
        let nodes = layout(&["a", "b", "c", "d", "e", "f"], 0);
        assert_eq!(nodes[5].x, GRID_LEFT);
        assert_eq!(nodes[5].y, GRID_TOP + NODE_HEIGHT + GAP);
        assert_eq!(nodes[5].text, "f");
    }

    #[test]
    fn test_continues_from_existing() {
        let nodes = layout(&["x"], 7);
        // Index 7: row 1, col 2.
        assert_eq!(nodes[0].x, GRID_LEFT + 2.0 * (NODE_WIDTH + GAP));
        assert_eq!(nodes[0].y, GRID_TOP + NODE_HEIGHT + GAP);
    }

    #[test]
    fn test_fresh_ids() {
        let a = layout(&["same"], 0);
        let b = layout(&["same"], 0);
        assert_ne!(a[0].id, b[0].id);
        assert!(layout::<&str>(&[], 3).is_empty());
    }
}
