//! Freehand pen stroke.

use super::{DEFAULT_STROKE_COLOR, EntityId, new_entity_id};
use crate::geometry::{distance_to_polyline, points_iter, polyline_bounds};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

fn new_stroke_id() -> EntityId {
    new_entity_id("line")
}

/// A committed freehand drawing. Points are stored flattened as
/// `[x0, y0, x1, y1, ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(default = "new_stroke_id")]
    pub id: EntityId,
    pub points: Vec<f64>,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_STROKE_COLOR.to_string()
}

impl Stroke {
    /// Minimum number of points a pen gesture needs to become a stroke.
    pub const MIN_POINTS: usize = 2;

    /// Create a stroke with a fresh id.
    pub fn new(points: Vec<f64>, color: impl Into<String>) -> Self {
        Self {
            id: new_stroke_id(),
            points,
            color: color.into(),
        }
    }

    /// Number of (x, y) points.
    pub fn len(&self) -> usize {
        self.points.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.points.len() < 2
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        points_iter(&self.points)
    }

    /// Bounding box, `None` for an empty stroke.
    pub fn bounds(&self) -> Option<Rect> {
        polyline_bounds(&self.points)
    }

    /// Whether any segment passes within `radius` of `point`.
    pub fn hit_test(&self, point: Point, radius: f64) -> bool {
        distance_to_polyline(point, &self.points) <= radius
    }

    /// Flattened points shifted by `delta`.
    pub fn translated_points(points: &[f64], delta: Vec2) -> Vec<f64> {
        points
            .iter()
            .enumerate()
            .map(|(i, v)| if i % 2 == 0 { v + delta.x } else { v + delta.y })
            .collect()
    }

    /// Non-empty, even-length and finite.
    pub fn is_well_formed(&self) -> bool {
        !self.points.is_empty()
            && self.points.len() % 2 == 0
            && self.points.iter().all(|v| v.is_finite())
    }
}
