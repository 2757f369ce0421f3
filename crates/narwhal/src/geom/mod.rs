//! Axis-aligned rectangles and the small amount of segment geometry the layout needs.

pub mod visibility;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box stored by its extents.
///
/// The empty rectangle has inverted infinite extents so that it is the identity for `union`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for Rectangle {
    fn default() -> Self {
        Self::empty()
    }
}

impl Rectangle {
    pub const fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub const fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        )
    }

    /// Box of `width` x `height` centred on `(cx, cy)`.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let w2 = width / 2.0;
        let h2 = height / 2.0;
        Self::new(cx - w2, cx + w2, cy - h2, cy + h2)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn cx(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    pub fn cy(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.cx(), self.cy())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Depth of penetration along x, measured from whichever side `other`'s centre lies on.
    /// Zero when the boxes are apart on x.
    pub fn overlap_x(&self, other: &Rectangle) -> f64 {
        let ux = self.cx();
        let vx = other.cx();
        if ux <= vx && other.min_x < self.max_x {
            return self.max_x - other.min_x;
        }
        if vx <= ux && self.min_x < other.max_x {
            return other.max_x - self.min_x;
        }
        0.0
    }

    pub fn overlap_y(&self, other: &Rectangle) -> f64 {
        let uy = self.cy();
        let vy = other.cy();
        if uy <= vy && other.min_y < self.max_y {
            return self.max_y - other.min_y;
        }
        if vy <= uy && self.min_y < other.max_y {
            return other.max_y - self.min_y;
        }
        0.0
    }

    pub fn set_x_centre(&mut self, cx: f64) {
        let dx = cx - self.cx();
        self.min_x += dx;
        self.max_x += dx;
    }

    pub fn set_y_centre(&mut self, cy: f64) {
        let dy = cy - self.cy();
        self.min_y += dy;
        self.max_y += dy;
    }

    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle::new(
            self.min_x.min(other.min_x),
            self.max_x.max(other.max_x),
            self.min_y.min(other.min_y),
            self.max_y.max(other.max_y),
        )
    }

    /// Grows (or, for negative `pad`, shrinks) every side by `pad`.
    ///
    /// An empty rectangle stays empty, so padding never turns the infinite sentinels into NaN
    /// further down the line.
    pub fn inflate(&self, pad: f64) -> Rectangle {
        if self.is_empty() {
            return *self;
        }
        Rectangle::new(
            self.min_x - pad,
            self.max_x + pad,
            self.min_y - pad,
            self.max_y + pad,
        )
    }

    /// Corners in clockwise order starting at `(min_x, min_y)`.
    pub fn vertices(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }

    /// Points where the segment `p1-p2` crosses the sides of this rectangle.
    pub fn line_intersections(&self, p1: Point, p2: Point) -> Vec<Point> {
        let v = self.vertices();
        (0..4)
            .filter_map(|i| line_intersection(p1, p2, v[i], v[(i + 1) % 4]))
            .collect()
    }

    /// First boundary crossing of the ray from the centre towards `p`.
    pub fn ray_intersection(&self, p: Point) -> Option<Point> {
        self.line_intersections(self.center(), p).into_iter().next()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        self.min_x <= p.x && p.x <= self.max_x && self.min_y <= p.y && p.y <= self.max_y
    }
}

/// Intersection point of segments `p1-p2` and `p3-p4`, if they cross.
///
/// Parallel (including degenerate zero-length) segments never intersect.
pub fn line_intersection(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let dx12 = p2.x - p1.x;
    let dx34 = p4.x - p3.x;
    let dy12 = p2.y - p1.y;
    let dy34 = p4.y - p3.y;
    let denominator = dy34 * dx12 - dx34 * dy12;
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    let dx31 = p1.x - p3.x;
    let dy31 = p1.y - p3.y;
    let a = (dx34 * dy31 - dy34 * dx31) / denominator;
    let b = (dx12 * dy31 - dy12 * dx31) / denominator;
    if (0.0..=1.0).contains(&a) && (0.0..=1.0).contains(&b) {
        return Some(Point::new(p1.x + a * dx12, p1.y + a * dy12));
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEndpoints {
    pub source_intersection: Point,
    pub target_intersection: Point,
    /// Where the line stops to leave room for an arrow head of the requested length.
    pub arrow_start: Point,
}

/// Straight edge between the boundaries of two boxes, shortened by `arrow_head` at the target.
pub fn make_edge_between(source: &Rectangle, target: &Rectangle, arrow_head: f64) -> EdgeEndpoints {
    let si = source
        .ray_intersection(target.center())
        .unwrap_or_else(|| source.center());
    let ti = target
        .ray_intersection(source.center())
        .unwrap_or_else(|| target.center());
    let dx = ti.x - si.x;
    let dy = ti.y - si.y;
    let l = (dx * dx + dy * dy).sqrt();
    let arrow_start = if l > 0.0 {
        let al = l - arrow_head;
        Point::new(si.x + al * dx / l, si.y + al * dy / l)
    } else {
        si
    };
    EdgeEndpoints {
        source_intersection: si,
        target_intersection: ti,
        arrow_start,
    }
}

/// Point on the way from `s` to the boundary of `target`, `arrow_head` short of it.
pub fn make_edge_to(s: Point, target: &Rectangle, arrow_head: f64) -> Point {
    let ti = target.ray_intersection(s).unwrap_or_else(|| target.center());
    let dx = ti.x - s.x;
    let dy = ti.y - s.y;
    let l = (dx * dx + dy * dy).sqrt();
    if l == 0.0 {
        return ti;
    }
    Point::new(ti.x - arrow_head * dx / l, ti.y - arrow_head * dy / l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflate_keeps_empty_rectangles_empty() {
        let r = Rectangle::empty().inflate(10.0);
        assert!(r.is_empty());
        assert_eq!(r.min_x, f64::INFINITY);
        assert_eq!(r.max_x, f64::NEG_INFINITY);
    }

    #[test]
    fn overlap_is_zero_for_touching_boxes() {
        let a = Rectangle::new(0.0, 1.0, 0.0, 1.0);
        let b = Rectangle::new(1.0, 2.0, 0.0, 1.0);
        assert_eq!(a.overlap_x(&b), 0.0);
        assert_eq!(a.overlap_y(&b), 1.0);
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let r = line_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
        );
        assert_eq!(r, None);
    }

    #[test]
    fn edge_between_coincident_boxes_does_not_produce_nan() {
        let a = Rectangle::from_center(0.0, 0.0, 2.0, 2.0);
        let e = make_edge_between(&a, &a, 1.0);
        assert!(e.arrow_start.x.is_finite() && e.arrow_start.y.is_finite());
    }
}
