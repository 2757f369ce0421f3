//! Visibility graph over rectangular obstacles, used for polyline edge routing.

use super::{Point, Rectangle};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityVertex {
    pub p: Point,
    /// Obstacle this vertex is a corner of; `None` for ports added later.
    pub obstacle: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEdge {
    pub source: usize,
    pub target: usize,
    pub length: f64,
}

#[derive(Debug, Clone)]
pub struct VisibilityGraph {
    obstacles: Vec<Rectangle>,
    pub vertices: Vec<VisibilityVertex>,
    pub edges: Vec<VisibilityEdge>,
}

impl VisibilityGraph {
    /// Connects every pair of obstacle corners that can see each other.
    pub fn new(obstacles: Vec<Rectangle>) -> Self {
        let mut vertices = Vec::new();
        for (i, r) in obstacles.iter().enumerate() {
            if r.is_empty() {
                continue;
            }
            for p in r.vertices() {
                vertices.push(VisibilityVertex {
                    p,
                    obstacle: Some(i),
                });
            }
        }
        let mut g = Self {
            obstacles,
            vertices,
            edges: Vec::new(),
        };
        let n = g.vertices.len();
        for a in 0..n {
            for b in (a + 1)..n {
                g.add_edge_if_visible(a, b, &[]);
            }
        }
        g
    }

    pub fn obstacles(&self) -> &[Rectangle] {
        &self.obstacles
    }

    /// Adds a free vertex at `p` and links it to every vertex it can see. The obstacle `inside`
    /// (typically the node the port belongs to) is not treated as blocking.
    pub fn add_point(&mut self, p: Point, inside: Option<usize>) -> usize {
        let id = self.vertices.len();
        self.vertices.push(VisibilityVertex { p, obstacle: None });
        let ignore: Vec<usize> = inside.into_iter().collect();
        for other in 0..id {
            self.add_edge_if_visible(id, other, &ignore);
        }
        id
    }

    /// Adds the edge `a-b` unless an obstacle outside `ignore` blocks the segment.
    pub fn add_edge_if_visible(&mut self, a: usize, b: usize, ignore: &[usize]) -> bool {
        let p = self.vertices[a].p;
        let q = self.vertices[b].p;
        if !self.is_visible(p, q, ignore) {
            return false;
        }
        self.edges.push(VisibilityEdge {
            source: a,
            target: b,
            length: p.distance_to(q),
        });
        true
    }

    pub fn is_visible(&self, p: Point, q: Point, ignore: &[usize]) -> bool {
        self.obstacles
            .iter()
            .enumerate()
            .filter(|(i, r)| !ignore.contains(i) && !r.is_empty())
            .all(|(_, r)| !crosses_interior(p, q, r))
    }
}

/// Whether segment `p-q` passes through the open interior of `r`.
///
/// Liang-Barsky clip against the closed box, then test the midpoint of the clipped chord: on a
/// convex box the chord lies on the boundary exactly when its midpoint does.
fn crosses_interior(p: Point, q: Point, r: &Rectangle) -> bool {
    let dx = q.x - p.x;
    let dy = q.y - p.y;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (pk, qk) in [
        (-dx, p.x - r.min_x),
        (dx, r.max_x - p.x),
        (-dy, p.y - r.min_y),
        (dy, r.max_y - p.y),
    ] {
        if pk == 0.0 {
            if qk < 0.0 {
                return false;
            }
            continue;
        }
        let t = qk / pk;
        if pk < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
    }
    if t0 >= t1 - EPS {
        return false;
    }
    let tm = (t0 + t1) / 2.0;
    let mx = p.x + tm * dx;
    let my = p.y + tm * dy;
    r.min_x + EPS < mx && mx < r.max_x - EPS && r.min_y + EPS < my && my < r.max_y - EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_through_a_box_is_blocked_but_its_sides_are_not() {
        let r = Rectangle::new(0.0, 10.0, 0.0, 10.0);
        assert!(crosses_interior(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            &r
        ));
        assert!(!crosses_interior(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            &r
        ));
        assert!(!crosses_interior(
            Point::new(-5.0, 20.0),
            Point::new(20.0, 20.0),
            &r
        ));
    }

    #[test]
    fn corners_of_one_box_see_along_its_sides_only() {
        let g = VisibilityGraph::new(vec![Rectangle::new(0.0, 10.0, 0.0, 10.0)]);
        assert_eq!(g.vertices.len(), 4);
        // Four sides, no diagonals.
        assert_eq!(g.edges.len(), 4);
    }
}
