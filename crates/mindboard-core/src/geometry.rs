//! Hit-testing and bounding-box helpers.
//!
//! Everything here is a pure function over `kurbo` points and rectangles.
//! Stroke geometry is expressed over flattened `[x0, y0, x1, y1, ...]`
//! coordinate slices, which is how strokes travel on the wire.

use kurbo::{Point, Rect, Vec2};

/// Distance from a point to a line segment (a→b).
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    point.distance(proj)
}

/// Iterate the points of a flattened coordinate slice. A trailing odd
/// coordinate is ignored.
pub fn points_iter(coords: &[f64]) -> impl Iterator<Item = Point> + '_ {
    coords.chunks_exact(2).map(|c| Point::new(c[0], c[1]))
}

/// Minimum distance from a point to the polyline described by `coords`.
///
/// A single-point polyline degenerates to point distance; an empty one is
/// infinitely far away.
pub fn distance_to_polyline(point: Point, coords: &[f64]) -> f64 {
    let pts: Vec<Point> = points_iter(coords).collect();
    match pts.as_slice() {
        [] => f64::INFINITY,
        [only] => point.distance(*only),
        _ => pts
            .windows(2)
            .map(|w| distance_to_segment(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Axis-aligned bounding box of a flattened coordinate slice.
pub fn polyline_bounds(coords: &[f64]) -> Option<Rect> {
    let mut iter = points_iter(coords);
    let first = iter.next()?;
    Some(iter.fold(Rect::from_points(first, first), |acc, p| acc.union_pt(p)))
}

/// Rectangle spanned by two corner points, normalized so width and height are
/// never negative.
pub fn normalized_rect(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b).abs()
}

/// Closed-interval rectangle overlap test.
///
/// Touching edges count as intersecting, so zero-area boxes (a perfectly
/// horizontal stroke, say) can still be selected.
pub fn rects_intersect(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && a.x1 >= b.x0 && a.y0 <= b.y1 && a.y1 >= b.y0
}

/// Point inside the box with top-left (x, y) and the given size.
pub fn point_in_rect(point: Point, x: f64, y: f64, width: f64, height: f64) -> bool {
    point.x >= x && point.x <= x + width && point.y >= y && point.y <= y + height
}

/// Point inside the ellipse inscribed in the given box, using the normalized
/// quadratic form `(dx/rx)^2 + (dy/ry)^2 <= 1`.
pub fn point_in_ellipse(point: Point, x: f64, y: f64, width: f64, height: f64) -> bool {
    let rx = width / 2.0;
    let ry = height / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let dx = (point.x - (x + rx)) / rx;
    let dy = (point.y - (y + ry)) / ry;
    dx * dx + dy * dy <= 1.0
}

/// Vertices of the isosceles triangle inscribed in the given box: apex at the
/// top-center, base along the bottom edge.
pub fn triangle_vertices(x: f64, y: f64, width: f64, height: f64) -> [Point; 3] {
    [
        Point::new(x + width / 2.0, y),
        Point::new(x, y + height),
        Point::new(x + width, y + height),
    ]
}

/// Point inside the box's inscribed triangle: the three edge cross products
/// must not disagree in sign. A degenerate triangle contains nothing.
pub fn point_in_triangle(point: Point, x: f64, y: f64, width: f64, height: f64) -> bool {
    let [a, b, c] = triangle_vertices(x, y, width, height);
    if (b - a).cross(c - a) == 0.0 {
        return false;
    }
    let cross = |p1: Point, p2: Point| (p2 - p1).cross(point - p1);
    let d1 = cross(a, b);
    let d2 = cross(b, c);
    let d3 = cross(c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Square box of the given radius centered on a point.
pub fn box_around(center: Point, radius: f64) -> Rect {
    Rect::new(
        center.x - radius,
        center.y - radius,
        center.x + radius,
        center.y + radius,
    )
}
