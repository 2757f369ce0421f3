//! Separation constraints that remove rectangle overlap along one axis.
//!
//! The generator sweeps a line across the rectangles' extents on the other axis. Open rectangles
//! sit in an ordered scanline keyed by their centre on the constrained axis; neighbours found there
//! are linked, and each link becomes exactly one separation constraint when the first of the two
//! rectangles closes.

use crate::algo::TotalF64;
use crate::algo::vpsc::{Constraint, Solver, Variable};
use crate::error::Result;
use crate::geom::Rectangle;
use crate::graph::{Group, Node, RootGroup};
use indexmap::IndexSet;
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};

/// Extra separation added to every generated constraint.
pub const MIN_SEPARATION: f64 = 1e-6;

/// Ordered set of open rectangles, keyed by centre with the local index as tie breaker.
pub type Scanline = BTreeSet<(TotalF64, usize)>;

#[derive(Debug, Clone)]
pub struct SweepNode {
    pub var: usize,
    pub r: Rectangle,
    pub pos: f64,
    pub prev: IndexSet<usize>,
    pub next: IndexSet<usize>,
}

impl SweepNode {
    fn new(var: usize, r: Rectangle, pos: f64) -> Self {
        Self {
            var,
            r,
            pos,
            prev: IndexSet::new(),
            next: IndexSet::new(),
        }
    }

    fn key(&self, id: usize) -> (TotalF64, usize) {
        (TotalF64(self.pos), id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Prev,
    Next,
}

fn link(nodes: &mut [SweepNode], v: usize, u: usize, dir: Direction) {
    match dir {
        Direction::Next => {
            nodes[v].next.insert(u);
            nodes[u].prev.insert(v);
        }
        Direction::Prev => {
            nodes[v].prev.insert(u);
            nodes[u].next.insert(v);
        }
    }
}

/// Which rectangle accessors the generator uses. `centre`/`size` are along the constrained axis,
/// `open`/`close` along the swept one.
pub trait SweepAxis {
    fn centre(&self, r: &Rectangle) -> f64;
    fn open(&self, r: &Rectangle) -> f64;
    fn close(&self, r: &Rectangle) -> f64;
    fn size(&self, r: &Rectangle) -> f64;
    fn make_rect(&self, open: f64, close: f64, centre: f64, size: f64) -> Rectangle;
    /// Links `v`, just inserted into `scanline`, to the neighbours it must be separated from.
    fn find_neighbours(&self, v: usize, scanline: &Scanline, nodes: &mut [SweepNode]);
}

/// Constrains x: sweeps along y, scanline ordered by x centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct XSweep;

/// Constrains y: sweeps along x, scanline ordered by y centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct YSweep;

impl SweepAxis for XSweep {
    fn centre(&self, r: &Rectangle) -> f64 {
        r.cx()
    }

    fn open(&self, r: &Rectangle) -> f64 {
        r.min_y
    }

    fn close(&self, r: &Rectangle) -> f64 {
        r.max_y
    }

    fn size(&self, r: &Rectangle) -> f64 {
        r.width()
    }

    fn make_rect(&self, open: f64, close: f64, centre: f64, size: f64) -> Rectangle {
        Rectangle::new(centre - size / 2.0, centre + size / 2.0, open, close)
    }

    // Walks outwards in both directions. A pair is linked when it does not overlap in x, or
    // overlaps less in x than in y; the walk stops at the first rectangle clear of `v` in x.
    fn find_neighbours(&self, v: usize, scanline: &Scanline, nodes: &mut [SweepNode]) {
        let key = nodes[v].key(v);
        for dir in [Direction::Next, Direction::Prev] {
            let candidates: Box<dyn Iterator<Item = &(TotalF64, usize)>> = match dir {
                Direction::Next => Box::new(scanline.range((Excluded(key), Unbounded))),
                Direction::Prev => Box::new(scanline.range(..key).rev()),
            };
            for &(_, u) in candidates {
                let overlap_x = nodes[u].r.overlap_x(&nodes[v].r);
                if overlap_x <= 0.0 || overlap_x <= nodes[u].r.overlap_y(&nodes[v].r) {
                    link(nodes, v, u, dir);
                }
                if overlap_x <= 0.0 {
                    break;
                }
            }
        }
    }
}

impl SweepAxis for YSweep {
    fn centre(&self, r: &Rectangle) -> f64 {
        r.cy()
    }

    fn open(&self, r: &Rectangle) -> f64 {
        r.min_x
    }

    fn close(&self, r: &Rectangle) -> f64 {
        r.max_x
    }

    fn size(&self, r: &Rectangle) -> f64 {
        r.height()
    }

    fn make_rect(&self, open: f64, close: f64, centre: f64, size: f64) -> Rectangle {
        Rectangle::new(open, close, centre - size / 2.0, centre + size / 2.0)
    }

    // Only the immediate neighbours, and only while they still overlap in x: pairs that the x
    // pass separates are left alone.
    fn find_neighbours(&self, v: usize, scanline: &Scanline, nodes: &mut [SweepNode]) {
        let key = nodes[v].key(v);
        let next = scanline.range((Excluded(key), Unbounded)).next().map(|&(_, u)| u);
        let prev = scanline.range(..key).next_back().map(|&(_, u)| u);
        for (dir, u) in [(Direction::Next, next), (Direction::Prev, prev)] {
            if let Some(u) = u {
                if nodes[u].r.overlap_x(&nodes[v].r) > 0.0 {
                    link(nodes, v, u, dir);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Event {
    open: bool,
    node: usize,
    pos: f64,
}

/// Separation constraints that keep `rs` from overlapping along `axis`. `vars[i]` is the
/// solver variable of `rs[i]`.
pub fn generate_constraints(
    rs: &[Rectangle],
    vars: &[usize],
    axis: &dyn SweepAxis,
    min_sep: f64,
) -> Vec<Constraint> {
    debug_assert!(vars.len() >= rs.len());
    let mut nodes: Vec<SweepNode> = rs
        .iter()
        .zip(vars)
        .map(|(r, &var)| SweepNode::new(var, *r, axis.centre(r)))
        .collect();
    let n = nodes.len();

    let mut events = Vec::with_capacity(2 * n);
    for (i, r) in rs.iter().take(n).enumerate() {
        events.push(Event {
            open: true,
            node: i,
            pos: axis.open(r),
        });
        events.push(Event {
            open: false,
            node: i,
            pos: axis.close(r),
        });
    }
    // Opens first on ties, so rectangles that only touch are still compared.
    events.sort_by(|a, b| a.pos.total_cmp(&b.pos).then_with(|| b.open.cmp(&a.open)));

    let mut cs = Vec::new();
    let mut scanline = Scanline::new();
    let make = |nodes: &[SweepNode], l: usize, r: usize| {
        let gap = (axis.size(&nodes[l].r) + axis.size(&nodes[r].r)) / 2.0 + min_sep;
        Constraint::separation(nodes[l].var, nodes[r].var, gap)
    };
    for e in events {
        let v = e.node;
        let key = nodes[v].key(v);
        if e.open {
            scanline.insert(key);
            axis.find_neighbours(v, &scanline, &mut nodes);
        } else {
            scanline.remove(&key);
            let prev = std::mem::take(&mut nodes[v].prev);
            for u in prev {
                cs.push(make(&nodes, u, v));
                nodes[u].next.shift_remove(&v);
            }
            let next = std::mem::take(&mut nodes[v].next);
            for u in next {
                cs.push(make(&nodes, v, u));
                nodes[u].prev.shift_remove(&v);
            }
        }
    }
    debug_assert!(scanline.is_empty());
    cs
}

pub fn generate_x_constraints(rs: &[Rectangle], vars: &[usize]) -> Vec<Constraint> {
    generate_constraints(rs, vars, &XSweep, MIN_SEPARATION)
}

pub fn generate_y_constraints(rs: &[Rectangle], vars: &[usize]) -> Vec<Constraint> {
    generate_constraints(rs, vars, &YSweep, MIN_SEPARATION)
}

/// Solver variable ids of group extents: after the `n` node variables, two per group.
#[derive(Debug, Clone, Copy)]
pub struct GroupVars {
    pub node_count: usize,
}

impl GroupVars {
    pub fn min_var(&self, group: usize) -> usize {
        self.node_count + 2 * group
    }

    pub fn max_var(&self, group: usize) -> usize {
        self.node_count + 2 * group + 1
    }
}

struct GroupContext<'a> {
    nodes: &'a [Node],
    groups: &'a [Group],
    vars: GroupVars,
    axis: &'a dyn SweepAxis,
    min_sep: f64,
}

/// Constraints for the whole group tree under `root`: each group's extent variables enclose
/// its members, and siblings at every level are kept apart.
///
/// Node and group bounds must be current (see [`compute_group_bounds`]). The desired positions
/// of every group's extent variables are written into `desired`. Groups with empty bounds are
/// skipped.
pub fn generate_group_constraints(
    root: &RootGroup,
    groups: &[Group],
    nodes: &[Node],
    axis: &dyn SweepAxis,
    min_sep: f64,
    desired: &mut [f64],
) -> Vec<Constraint> {
    let ctx = GroupContext {
        nodes,
        groups,
        vars: GroupVars {
            node_count: nodes.len(),
        },
        axis,
        min_sep,
    };
    level_constraints(&ctx, &root.leaves, &root.groups, None, desired)
}

fn level_constraints(
    ctx: &GroupContext<'_>,
    leaves: &[usize],
    child_groups: &[usize],
    contained: Option<usize>,
    desired: &mut [f64],
) -> Vec<Constraint> {
    let axis = ctx.axis;
    let children: Vec<usize> = child_groups
        .iter()
        .copied()
        .filter(|&g| !ctx.groups[g].bounds.is_empty())
        .collect();

    let mut cs = Vec::new();
    for &g in &children {
        let group = &ctx.groups[g];
        cs.extend(level_constraints(
            ctx,
            &group.leaves,
            &group.groups,
            Some(g),
            desired,
        ));
    }

    let mut rs = Vec::with_capacity(leaves.len() + children.len() + 2);
    let mut vs = Vec::with_capacity(rs.capacity());
    if let Some(g) = contained {
        let group = &ctx.groups[g];
        let b = group.bounds;
        let p = group.padding;
        let c = axis.centre(&b);
        let s = axis.size(&b) / 2.0;
        let (open, close) = (axis.open(&b), axis.close(&b));
        let min = c - s + p / 2.0;
        let max = c + s - p / 2.0;
        let (min_var, max_var) = (ctx.vars.min_var(g), ctx.vars.max_var(g));
        desired[min_var] = min;
        rs.push(axis.make_rect(open, close, min, p));
        vs.push(min_var);
        desired[max_var] = max;
        rs.push(axis.make_rect(open, close, max, p));
        vs.push(max_var);
    }
    for &l in leaves {
        rs.push(ctx.nodes[l].bounds);
        vs.push(l);
    }
    for &g in &children {
        let b = ctx.groups[g].bounds;
        rs.push(axis.make_rect(
            axis.open(&b),
            axis.close(&b),
            axis.centre(&b),
            axis.size(&b),
        ));
        vs.push(ctx.vars.min_var(g));
    }

    let mut level = generate_constraints(&rs, &vs, axis, ctx.min_sep);
    // A child group stood in as one rectangle on its min variable. Re-anchor constraints leaving
    // it on the max variable and shrink both sides by the difference between that rectangle and
    // the padding-sized extent markers.
    for &g in &children {
        let group = &ctx.groups[g];
        let adjustment = (group.padding - axis.size(&group.bounds)) / 2.0;
        let (min_var, max_var) = (ctx.vars.min_var(g), ctx.vars.max_var(g));
        for c in &mut level {
            if c.right == min_var {
                c.gap += adjustment;
            }
            if c.left == min_var {
                c.left = max_var;
                c.gap += adjustment;
            }
        }
    }
    cs.extend(level);
    cs
}

/// Recomputes every group's bounds bottom-up as the padded union of its members and returns
/// the (unpadded) union of everything under `root`.
pub fn compute_group_bounds(root: &RootGroup, groups: &mut [Group], nodes: &[Node]) -> Rectangle {
    let mut b = root
        .leaves
        .iter()
        .fold(Rectangle::empty(), |r, &l| nodes[l].bounds.union(&r));
    for &g in &root.groups {
        b = group_bounds(g, groups, nodes).union(&b);
    }
    b
}

fn group_bounds(g: usize, groups: &mut [Group], nodes: &[Node]) -> Rectangle {
    let mut b = groups[g]
        .leaves
        .iter()
        .fold(Rectangle::empty(), |r, &l| nodes[l].bounds.union(&r));
    for k in 0..groups[g].groups.len() {
        let child = groups[g].groups[k];
        b = group_bounds(child, groups, nodes).union(&b);
    }
    b = b.inflate(groups[g].padding);
    groups[g].bounds = b;
    b
}

/// Moves the rectangles so that none overlap, x first, then y.
pub fn remove_overlaps(rs: &mut [Rectangle]) -> Result<()> {
    let ids: Vec<usize> = (0..rs.len()).collect();

    let vs = rs.iter().map(|r| Variable::new(r.cx(), 1.0)).collect();
    let mut solver = Solver::new(vs, generate_x_constraints(rs, &ids));
    solver.solve()?;
    for (i, r) in rs.iter_mut().enumerate() {
        r.set_x_centre(solver.position(i));
    }

    let vs = rs.iter().map(|r| Variable::new(r.cy(), 1.0)).collect();
    let mut solver = Solver::new(vs, generate_y_constraints(rs, &ids));
    solver.solve()?;
    for (i, r) in rs.iter_mut().enumerate() {
        r.set_y_centre(solver.position(i));
    }
    Ok(())
}
