//! Splitting a graph into connected components and packing the components side by side.

use crate::geom::Rectangle;
use crate::graph::{Link, Node};

const PADDING: f64 = 10.0;
const GOLDEN_SECTION: f64 = 1.618_033_988_749_895;
const FLOAT_EPSILON: f64 = 0.0001;
const MAX_ITERATIONS: usize = 100;

/// Node indices of each connected component, in order of their lowest node index.
pub fn separate_graphs(node_count: usize, links: &[Link]) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for l in links {
        if l.source < node_count && l.target < node_count {
            adjacency[l.source].push(l.target);
            adjacency[l.target].push(l.source);
        }
    }
    let mut marked = vec![false; node_count];
    let mut graphs = Vec::new();
    for start in 0..node_count {
        if marked[start] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        marked[start] = true;
        while let Some(v) = stack.pop() {
            component.push(v);
            for &u in &adjacency[v] {
                if !marked[u] {
                    marked[u] = true;
                    stack.push(u);
                }
            }
        }
        component.sort_unstable();
        graphs.push(component);
    }
    graphs
}

#[derive(Debug, Clone, Copy)]
struct Packed {
    /// Bounding box of the component's nodes before packing.
    bounds: Rectangle,
    x: f64,
    y: f64,
    space_left: f64,
    bottom: f64,
}

impl Packed {
    fn width(&self) -> f64 {
        self.bounds.width()
    }

    fn height(&self) -> f64 {
        self.bounds.height()
    }
}

#[derive(Debug, Default)]
struct Shelves {
    real_width: f64,
    real_height: f64,
    global_bottom: f64,
    line: Vec<usize>,
}

impl Shelves {
    fn put_rect(&mut self, rects: &mut [Packed], id: usize, max_width: f64) {
        let (w, h) = (rects[id].width(), rects[id].height());
        let parent = self.line.iter().copied().find(|&p| {
            let p = &rects[p];
            p.space_left >= h && p.x + p.width() + w + PADDING - max_width <= FLOAT_EPSILON
        });
        self.line.push(id);
        match parent {
            Some(p) => {
                let (px, pw, pbottom) = (rects[p].x, rects[p].width(), rects[p].bottom);
                rects[p].space_left -= h + PADDING;
                rects[p].bottom += h + PADDING;
                let r = &mut rects[id];
                r.x = px + pw + PADDING;
                r.y = pbottom;
                r.space_left = h;
                r.bottom = r.y;
            }
            None => {
                let r = &mut rects[id];
                r.y = self.global_bottom;
                self.global_bottom += h + PADDING;
                r.x = 0.0;
                r.space_left = h;
                r.bottom = r.y;
            }
        }
        let r = &rects[id];
        if r.y + h - self.real_height > -FLOAT_EPSILON {
            self.real_height = r.y + h;
        }
        if r.x + w - self.real_width > -FLOAT_EPSILON {
            self.real_width = r.x + w;
        }
    }
}

fn step(rects: &mut [Packed], max_width: f64, desired_ratio: f64) -> (f64, Shelves) {
    let mut shelves = Shelves::default();
    for id in 0..rects.len() {
        shelves.put_rect(rects, id, max_width);
    }
    let ratio = shelves.real_width / shelves.real_height;
    ((ratio - desired_ratio).abs(), shelves)
}

/// Moves the nodes of each component so the components tile a strip whose aspect ratio is
/// close to `desired_ratio`. With `center_graph` the tiling is centred in the `width` x
/// `height` canvas, otherwise its top-left corner is at the origin.
pub fn apply_packing(
    graphs: &[Vec<usize>],
    nodes: &mut [Node],
    width: f64,
    height: f64,
    node_size: f64,
    desired_ratio: f64,
    center_graph: bool,
) {
    if graphs.is_empty() {
        return;
    }
    let mut order: Vec<usize> = (0..graphs.len()).collect();
    let boxes: Vec<Rectangle> = graphs
        .iter()
        .map(|g| component_bounds(g, nodes, node_size))
        .collect();
    order.sort_by(|&a, &b| boxes[b].height().total_cmp(&boxes[a].height()));
    let mut rects: Vec<Packed> = order
        .iter()
        .map(|&g| Packed {
            bounds: boxes[g],
            x: 0.0,
            y: 0.0,
            space_left: 0.0,
            bottom: 0.0,
        })
        .collect();

    let min_width = rects
        .iter()
        .map(Packed::width)
        .fold(f64::INFINITY, f64::min);
    let entire_width: f64 = rects.iter().map(|r| r.width() + PADDING).sum();

    // Golden-section search over the strip width.
    let mut left = min_width;
    let mut right = entire_width;
    let mut x1 = left;
    let mut x2 = right;
    let mut f_x1 = f64::MAX;
    let mut f_x2 = f64::MAX;
    let mut flag: i8 = -1;
    let mut dx = f64::MAX;
    let mut df = f64::MAX;
    let mut best = (f64::INFINITY, right);
    let mut iterations = 0;
    while dx > min_width || df > FLOAT_EPSILON {
        if flag != 1 {
            x1 = right - (right - left) / GOLDEN_SECTION;
            f_x1 = step(&mut rects, x1, desired_ratio).0;
        }
        if flag != 0 {
            x2 = left + (right - left) / GOLDEN_SECTION;
            f_x2 = step(&mut rects, x2, desired_ratio).0;
        }
        dx = (x1 - x2).abs();
        df = (f_x1 - f_x2).abs();
        if f_x1 < best.0 {
            best = (f_x1, x1);
        }
        if f_x2 < best.0 {
            best = (f_x2, x2);
        }
        if f_x1 > f_x2 {
            left = x1;
            x1 = x2;
            f_x1 = f_x2;
            flag = 1;
        } else {
            right = x2;
            x2 = x1;
            f_x2 = f_x1;
            flag = 0;
        }
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            break;
        }
    }
    let (_, shelves) = step(&mut rects, best.1, desired_ratio);

    let (cx, cy) = if center_graph {
        (
            width / 2.0 - shelves.real_width / 2.0,
            height / 2.0 - shelves.real_height / 2.0,
        )
    } else {
        (0.0, 0.0)
    };
    for (slot, &g) in order.iter().enumerate() {
        let r = &rects[slot];
        let dx = r.x - r.bounds.min_x + cx;
        let dy = r.y - r.bounds.min_y + cy;
        for &v in &graphs[g] {
            let node = &mut nodes[v];
            node.x += dx;
            node.y += dy;
        }
    }
}

fn component_bounds(graph: &[usize], nodes: &[Node], node_size: f64) -> Rectangle {
    graph.iter().fold(Rectangle::empty(), |b, &v| {
        let n = &nodes[v];
        let w = n.width.unwrap_or(node_size);
        let h = n.height.unwrap_or(node_size);
        b.union(&Rectangle::from_center(n.x, n.y, w, h))
    })
}
