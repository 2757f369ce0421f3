//! The layout driver.
//!
//! [`Layout::start`] runs the one-shot phases (distance matrix, unconstrained descent, descent
//! under user constraints, component packing, descent under all constraints, optional grid snap)
//! and then hands over to the tick loop. Each [`Layout::tick`] is one Runge-Kutta step of the
//! descent engine with constraint projection; the loop ends when the step displacement (alpha)
//! drops below the convergence threshold.

pub mod options;

pub use options::{Drive, FlowLayout, LayoutOptions, LinkLengths, StartOptions};

use crate::algo::descent::{Descent, Unconstrained};
use crate::algo::disconnected::{apply_packing, separate_graphs};
use crate::algo::link_lengths::{
    generate_directed_edge_constraints, jaccard_link_lengths, symmetric_diff_link_lengths,
};
use crate::algo::power_graph::{self, PowerGraph};
use crate::algo::shortest_paths::Calculator;
use crate::error::{Error, Result};
use crate::geom::visibility::VisibilityGraph;
use crate::geom::{Point, Rectangle, make_edge_between, make_edge_to};
use crate::graph::{Constraint, FIXED_DRAG, FIXED_HOVER, Group, Link, Node, RootGroup};
use crate::overlap::compute_group_bounds;
use crate::projection::Projection;
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

/// Ideal distance between the two extent variables of a group.
const GROUP_EXTENT_DISTANCE: f64 = 0.1;
const RESUME_ALPHA: f64 = 0.1;
const GRID_SNAP_STRENGTH: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutState {
    Idle,
    Starting,
    Running,
    Converged,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Tick,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEvent {
    pub kind: EventKind,
    pub alpha: f64,
    pub stress: Option<f64>,
}

/// Node or group to drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    Node(usize),
    Group(usize),
}

type Listener = Box<dyn FnMut(&LayoutEvent)>;
type LinkValue = Box<dyn Fn(&Link) -> f64>;
type LinkType = Box<dyn Fn(&Link) -> u32>;

/// Solver state of one run, created by `start`.
#[derive(Debug, Clone)]
pub struct LayoutSession {
    descent: Descent,
    projection: Option<Projection>,
    root: RootGroup,
}

impl LayoutSession {
    pub fn descent(&self) -> &Descent {
        &self.descent
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Group tree the run was started with; every node is a root leaf when there are no groups.
    pub fn root(&self) -> &RootGroup {
        &self.root
    }

    /// Ideal distances used by the descent engine, including group extent variables.
    pub fn distance_matrix(&self) -> &DMatrix<f64> {
        &self.descent.d
    }
}

pub struct Layout {
    options: LayoutOptions,
    nodes: Vec<Node>,
    links: Vec<Link>,
    groups: Vec<Group>,
    root: Option<RootGroup>,
    constraints: Vec<Constraint>,
    link_distance_fn: Option<LinkValue>,
    link_type_fn: Option<LinkType>,
    flow_separation_fn: Option<LinkValue>,
    listeners: FxHashMap<EventKind, Listener>,
    session: Option<LayoutSession>,
    state: LayoutState,
    alpha: f64,
    last_stress: Option<f64>,
    visibility: Option<VisibilityGraph>,
    routing_margin: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self::with_options(LayoutOptions::default())
    }
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LayoutOptions) -> Self {
        Self {
            options,
            nodes: Vec::new(),
            links: Vec::new(),
            groups: Vec::new(),
            root: None,
            constraints: Vec::new(),
            link_distance_fn: None,
            link_type_fn: None,
            flow_separation_fn: None,
            listeners: FxHashMap::default(),
            session: None,
            state: LayoutState::Idle,
            alpha: 0.0,
            last_stress: None,
            visibility: None,
            routing_margin: 0.0,
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    /// Group membership is resolved and checked by `start`.
    pub fn with_groups(mut self, groups: Vec<Group>) -> Self {
        self.groups = groups;
        self.root = None;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.options.canvas_size = [width, height];
        self
    }

    pub fn avoid_overlaps(mut self, avoid: bool) -> Self {
        self.options.avoid_overlaps = avoid;
        self
    }

    pub fn handle_disconnected(mut self, handle: bool) -> Self {
        self.options.handle_disconnected = handle;
        self
    }

    pub fn convergence_threshold(mut self, threshold: f64) -> Self {
        self.options.convergence_threshold = threshold;
        self
    }

    /// A constant ideal link length. Clears any link-length calculator or distance function.
    pub fn link_distance(mut self, distance: f64) -> Self {
        self.options.link_distance = distance;
        self.options.link_lengths = LinkLengths::None;
        self.link_distance_fn = None;
        self
    }

    /// Per-link ideal length. Clears any link-length calculator.
    pub fn link_distance_fn(mut self, f: impl Fn(&Link) -> f64 + 'static) -> Self {
        self.options.link_lengths = LinkLengths::None;
        self.link_distance_fn = Some(Box::new(f));
        self
    }

    /// Classifies links for power-graph grouping; links of different types are never merged.
    pub fn link_type(mut self, f: impl Fn(&Link) -> u32 + 'static) -> Self {
        self.link_type_fn = Some(Box::new(f));
        self
    }

    pub fn symmetric_diff_link_lengths(mut self, ideal: f64, weight: f64) -> Self {
        self.link_distance_fn = None;
        self.options.link_lengths = LinkLengths::SymmetricDiff { ideal, weight };
        self
    }

    pub fn jaccard_link_lengths(mut self, ideal: f64, weight: f64) -> Self {
        self.link_distance_fn = None;
        self.options.link_lengths = LinkLengths::Jaccard { ideal, weight };
        self
    }

    pub fn flow_layout(mut self, axis: crate::graph::Axis, min_separation: f64) -> Self {
        self.options.flow_layout = Some(FlowLayout {
            axis,
            min_separation,
        });
        self.flow_separation_fn = None;
        self
    }

    /// Per-link separation for flow layout; the axis still comes from `flow_layout`.
    pub fn flow_separation_fn(mut self, f: impl Fn(&Link) -> f64 + 'static) -> Self {
        self.flow_separation_fn = Some(Box::new(f));
        self
    }

    /// Replaces the listener for `kind`.
    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&LayoutEvent) + 'static) -> &mut Self {
        self.listeners.insert(kind, Box::new(listener));
        self
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut LayoutOptions {
        &mut self.options
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn root_group(&self) -> Option<&RootGroup> {
        self.root.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn session(&self) -> Option<&LayoutSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn last_stress(&self) -> Option<f64> {
        self.last_stress
    }

    pub fn link_id(link: &Link) -> String {
        link.id()
    }

    fn trigger(&mut self, event: LayoutEvent) {
        if let Some(listener) = self.listeners.get_mut(&event.kind) {
            listener(&event);
        }
    }

    fn link_length(&self, link: &Link) -> f64 {
        if let Some(f) = &self.link_distance_fn {
            return f(link);
        }
        match self.options.link_lengths {
            LinkLengths::None => self.options.link_distance,
            LinkLengths::SymmetricDiff { ideal, .. } | LinkLengths::Jaccard { ideal, .. } => {
                ideal * link.length.unwrap_or(1.0)
            }
        }
    }

    fn link_type_of(&self, link: &Link) -> u32 {
        self.link_type_fn.as_ref().map_or(0, |f| f(link))
    }

    /// With links but no nodes, creates one unpositioned node per referenced index.
    fn ensure_nodes(&mut self) {
        if !self.nodes.is_empty() || self.links.is_empty() {
            return;
        }
        let n = self
            .links
            .iter()
            .map(|l| l.source.max(l.target))
            .max()
            .map_or(0, |m| m + 1);
        self.nodes = (0..n).map(|_| Node::new()).collect();
    }

    fn validate_links(&self) -> Result<()> {
        let n = self.nodes.len();
        for (link, l) in self.links.iter().enumerate() {
            for index in [l.source, l.target] {
                if index >= n {
                    return Err(Error::MissingNode { link, index });
                }
            }
        }
        Ok(())
    }

    /// Sets parent indices from group membership and derives the root group.
    fn resolve_groups(&mut self) -> Result<()> {
        let n = self.nodes.len();
        let gn = self.groups.len();
        for v in &mut self.nodes {
            v.parent = None;
        }
        let mut group_parent: Vec<Option<usize>> = vec![None; gn];
        for (gi, g) in self.groups.iter().enumerate() {
            for &l in &g.leaves {
                let Some(v) = self.nodes.get_mut(l) else {
                    return Err(Error::MissingGroupMember {
                        group: gi,
                        index: l,
                    });
                };
                if v.parent.is_some() {
                    return Err(Error::GroupHasMultipleParents { index: l });
                }
                v.parent = Some(gi);
            }
            for &c in &g.groups {
                if c >= gn {
                    return Err(Error::MissingGroup {
                        group: gi,
                        index: c,
                    });
                }
                if group_parent[c].is_some() {
                    return Err(Error::GroupHasMultipleParents { index: c });
                }
                group_parent[c] = Some(gi);
            }
        }
        for start in 0..gn {
            let mut p = group_parent[start];
            let mut steps = 0;
            while let Some(g) = p {
                if g == start || steps > gn {
                    return Err(Error::GroupCycle { group: start });
                }
                p = group_parent[g];
                steps += 1;
            }
        }
        for (g, parent) in self.groups.iter_mut().zip(&group_parent) {
            g.parent = *parent;
        }
        self.root = Some(RootGroup {
            leaves: (0..n).filter(|&i| self.nodes[i].parent.is_none()).collect(),
            groups: (0..gn).filter(|&i| group_parent[i].is_none()).collect(),
        });
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.validate_links()?;
        self.resolve_groups()?;
        let n = self.nodes.len();
        for c in &self.constraints {
            if let Some(index) = c.nodes().into_iter().find(|&i| i >= n) {
                return Err(Error::ConstraintNode { index });
            }
        }
        if let Some(d) = &self.options.distance_matrix {
            if d.len() < n || d.iter().take(n).any(|row| row.len() < n) {
                return Err(Error::DistanceMatrixShape {
                    expected: n,
                    rows: d.len(),
                });
            }
        }
        Ok(())
    }

    /// Runs the initial layout phases and, with `keep_running`, resumes the tick loop.
    pub fn start(&mut self, opts: StartOptions) -> Result<()> {
        self.ensure_nodes();
        self.validate()?;
        self.state = LayoutState::Starting;
        self.alpha = 0.0;
        self.last_stress = None;

        let n = self.nodes.len();
        let gn = self.groups.len();
        let big_n = n + 2 * gn;
        let [w, h] = self.options.canvas_size;
        tracing::debug!(nodes = n, links = self.links.len(), groups = gn, "layout: start");

        let mut x = vec![0.0; big_n];
        let mut y = vec![0.0; big_n];
        for (i, v) in self.nodes.iter_mut().enumerate() {
            v.index = i;
            if !v.has_position() {
                v.x = w / 2.0;
                v.y = h / 2.0;
            }
            x[i] = v.x;
            y[i] = v.y;
        }

        match self.options.link_lengths {
            LinkLengths::None => {}
            LinkLengths::SymmetricDiff { weight, .. } => {
                symmetric_diff_link_lengths(&mut self.links, weight)
            }
            LinkLengths::Jaccard { weight, .. } => jaccard_link_lengths(&mut self.links, weight),
        }

        let (mut d, mut g) = match &self.options.distance_matrix {
            Some(m) => {
                let d = DMatrix::from_fn(big_n, big_n, |i, j| {
                    m.get(i)
                        .and_then(|row| row.get(j))
                        .copied()
                        .unwrap_or(if i == j { 0.0 } else { f64::INFINITY })
                });
                (d, None)
            }
            None => {
                let edges: Vec<(usize, usize, f64)> = self
                    .links
                    .iter()
                    .map(|l| (l.source, l.target, self.link_length(l)))
                    .collect();
                let distances = Calculator::new(big_n, edges).distance_matrix();
                let d = DMatrix::from_fn(big_n, big_n, |i, j| distances[i][j]);
                let mut g = DMatrix::from_element(big_n, big_n, 2.0);
                for l in &self.links {
                    let weight = l.weight.filter(|&wt| wt != 0.0).unwrap_or(1.0);
                    g[(l.source, l.target)] = weight;
                    g[(l.target, l.source)] = weight;
                }
                (d, Some(g))
            }
        };
        let unreachable = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| !d[(i, j)].is_finite())
            .count();
        if unreachable > 0 {
            tracing::warn!(pairs = unreachable, "layout: distance matrix has unreachable pairs");
        }

        if gn > 0 {
            let g = g.get_or_insert_with(|| DMatrix::from_element(big_n, big_n, 1.0));
            for gi in 0..gn {
                let i = n + 2 * gi;
                g[(i, i + 1)] = self.options.group_compactness;
                g[(i + 1, i)] = self.options.group_compactness;
                d[(i, i + 1)] = GROUP_EXTENT_DISTANCE;
                d[(i + 1, i)] = GROUP_EXTENT_DISTANCE;
            }
        }
        let root = match &self.root {
            Some(root) if gn > 0 => root.clone(),
            _ => RootGroup {
                leaves: (0..n).collect(),
                groups: Vec::new(),
            },
        };

        let mut constraints = self.constraints.clone();
        if let Some(flow) = self.options.flow_layout {
            let separation = |l: &Link| {
                self.flow_separation_fn
                    .as_ref()
                    .map_or(flow.min_separation, |f| f(l))
            };
            constraints.extend(generate_directed_edge_constraints(
                n,
                &self.links,
                flow.axis,
                &separation,
            ));
        }

        let mut descent = Descent::new([DVector::from_vec(x), DVector::from_vec(y)], d)
            .with_seed(self.options.random_seed);
        descent.threshold = self.options.convergence_threshold;
        for (i, v) in self.nodes.iter_mut().enumerate() {
            if v.is_fixed() {
                let p = v.position();
                v.locked = Some(p);
                descent.locks.add(i, [p.x, p.y]);
            }
        }

        self.initial_layout(opts.unconstrained_iterations, &mut descent)?;

        let mut projection = if constraints.is_empty() {
            None
        } else {
            copy_positions(&descent, &mut self.nodes);
            Some(Projection::new(
                self.nodes.clone(),
                self.groups.clone(),
                Some(root.clone()),
                &constraints,
                false,
            )?)
        };
        let stress = descent.run(opts.user_constraint_iterations, &mut projection)?;
        tracing::debug!(
            iterations = opts.user_constraint_iterations,
            stress,
            "layout: user constraints"
        );
        self.separate_overlapping_components(&mut descent, opts.center_graph);

        if self.options.avoid_overlaps {
            copy_positions(&descent, &mut self.nodes);
            let p = Projection::new(
                self.nodes.clone(),
                self.groups.clone(),
                Some(root.clone()),
                &constraints,
                true,
            )?;
            for (i, v) in p.nodes().iter().enumerate() {
                descent.x[0][i] = v.x;
                descent.x[1][i] = v.y;
            }
            projection = Some(p);
        }
        descent.g = g.clone();
        let stress = descent.run(opts.all_constraints_iterations, &mut projection)?;
        tracing::debug!(
            iterations = opts.all_constraints_iterations,
            stress,
            avoid_overlaps = self.options.avoid_overlaps,
            "layout: all constraints"
        );

        if opts.grid_snap_iterations > 0 && n > 0 {
            descent.snap_strength = GRID_SNAP_STRENGTH;
            descent.snap_grid_size = self.nodes[0]
                .width
                .unwrap_or(self.options.default_node_size);
            descent.num_grid_snap_nodes = n;
            descent.scale_snap_by_max_h = n != big_n;
            let g0 = DMatrix::from_fn(big_n, big_n, |i, j| {
                if i >= n || j >= n {
                    g.as_ref().map_or(1.0, |g| g[(i, j)])
                } else {
                    0.0
                }
            });
            descent.g = Some(g0);
            let stress = descent.run(opts.grid_snap_iterations, &mut projection)?;
            tracing::debug!(iterations = opts.grid_snap_iterations, stress, "layout: grid snap");
        }

        copy_positions(&descent, &mut self.nodes);
        self.separate_overlapping_components(&mut descent, opts.center_graph);
        self.session = Some(LayoutSession {
            descent,
            projection,
            root,
        });
        self.refresh_group_bounds();

        if opts.keep_running {
            self.resume()
        } else {
            self.state = LayoutState::Stopped;
            Ok(())
        }
    }

    fn initial_layout(&mut self, iterations: usize, descent: &mut Descent) -> Result<()> {
        if self.groups.is_empty() || iterations == 0 {
            let stress = descent.run(iterations, &mut Unconstrained)?;
            tracing::debug!(iterations, stress, "layout: unconstrained");
            return Ok(());
        }
        // Lay out a stand-in graph where every group is a node linked to its members.
        let n = self.nodes.len();
        let mut edges: Vec<Link> = self
            .links
            .iter()
            .map(|l| Link::new(l.source, l.target))
            .collect();
        for (gi, g) in self.groups.iter().enumerate() {
            edges.extend(g.leaves.iter().map(|&v| Link::new(n + gi, v)));
            edges.extend(g.groups.iter().map(|&c| Link::new(n + gi, n + c)));
        }
        let options = LayoutOptions {
            canvas_size: self.options.canvas_size,
            link_distance: self.options.link_distance,
            link_lengths: LinkLengths::SymmetricDiff {
                ideal: 5.0,
                weight: 1.0,
            },
            convergence_threshold: 1e-4,
            random_seed: self.options.random_seed,
            ..LayoutOptions::default()
        };
        let mut nested = Layout::with_options(options)
            .with_nodes((0..n + self.groups.len()).map(|_| Node::new()).collect())
            .with_links(edges);
        nested.start(StartOptions {
            unconstrained_iterations: iterations,
            keep_running: false,
            ..StartOptions::default()
        })?;
        for (i, v) in nested.nodes().iter().take(n).enumerate() {
            descent.x[0][i] = v.x;
            descent.x[1][i] = v.y;
        }
        tracing::debug!(iterations, "layout: unconstrained (grouped)");
        Ok(())
    }

    /// Packs connected components into the canvas. Skipped with an explicit distance matrix.
    fn separate_overlapping_components(&mut self, descent: &mut Descent, center_graph: bool) {
        if self.options.distance_matrix.is_some() || !self.options.handle_disconnected {
            return;
        }
        copy_positions(descent, &mut self.nodes);
        let graphs = separate_graphs(self.nodes.len(), &self.links);
        let [w, h] = self.options.canvas_size;
        apply_packing(
            &graphs,
            &mut self.nodes,
            w,
            h,
            self.options.default_node_size,
            1.0,
            center_graph,
        );
        for (i, v) in self.nodes.iter_mut().enumerate() {
            if let Some(p) = descent.locks.get(i) {
                v.x = p[0];
                v.y = p[1];
            }
            descent.x[0][i] = v.x;
            descent.x[1][i] = v.y;
            v.update_bounds();
        }
        tracing::debug!(components = graphs.len(), "layout: packed components");
    }

    fn refresh_group_bounds(&mut self) {
        if let Some(root) = &self.root {
            compute_group_bounds(root, &mut self.groups, &self.nodes);
        }
    }

    /// One descent step. Returns `true` once converged (or stopped), after emitting `end`.
    pub fn tick(&mut self) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Err(Error::NotStarted);
        };
        if self.alpha < self.options.convergence_threshold {
            if self.state == LayoutState::Running {
                self.state = LayoutState::Converged;
                tracing::debug!(stress = self.last_stress, "layout: converged");
            }
            self.alpha = 0.0;
            let stress = self.last_stress;
            self.trigger(LayoutEvent {
                kind: EventKind::End,
                alpha: 0.0,
                stress,
            });
            return Ok(true);
        }

        session.descent.locks.clear();
        for (i, v) in self.nodes.iter_mut().enumerate() {
            if v.is_fixed() {
                let p = *v.locked.get_or_insert(Point::new(v.x, v.y));
                session.descent.locks.add(i, [p.x, p.y]);
            }
        }
        if let Some(p) = session.projection.as_mut() {
            p.sync_pins(&self.nodes);
        }
        let s1 = match session.descent.runge_kutta(&mut session.projection) {
            Ok(s1) => s1,
            Err(err) => {
                tracing::warn!(%err, "layout: tick failed, stopping");
                self.alpha = 0.0;
                self.state = LayoutState::Stopped;
                return Err(err);
            }
        };
        copy_positions(&session.descent, &mut self.nodes);

        if s1 == 0.0 {
            self.alpha = 0.0;
        } else if self.last_stress.is_some() {
            self.alpha = s1;
        }
        self.last_stress = Some(s1);
        self.refresh_group_bounds();
        tracing::trace!(alpha = self.alpha, stress = s1, "layout: tick");
        let alpha = self.alpha;
        self.trigger(LayoutEvent {
            kind: EventKind::Tick,
            alpha,
            stress: Some(s1),
        });
        Ok(false)
    }

    /// Ticks until convergence, at most `max_kick_ticks` times. A no-op under
    /// [`Drive::External`].
    pub fn kick(&mut self) -> Result<()> {
        if self.options.drive == Drive::External {
            return Ok(());
        }
        let mut ticks = 0;
        while !self.tick()? {
            ticks += 1;
            if ticks >= self.options.max_kick_ticks {
                tracing::warn!(ticks, alpha = self.alpha, "layout: kick stopped at tick limit");
                self.alpha = 0.0;
                self.state = LayoutState::Stopped;
                let stress = self.last_stress;
                self.trigger(LayoutEvent {
                    kind: EventKind::End,
                    alpha: 0.0,
                    stress,
                });
                break;
            }
        }
        Ok(())
    }

    /// While running, sets alpha (zero or less stops). While idle, a positive value starts the
    /// tick loop: emits `start`, then kicks.
    pub fn set_alpha(&mut self, x: f64) -> Result<()> {
        if self.alpha != 0.0 {
            if x > 0.0 {
                self.alpha = x;
            } else {
                self.alpha = 0.0;
                self.state = LayoutState::Stopped;
            }
        } else if x > 0.0 && self.state != LayoutState::Running {
            if self.session.is_none() {
                return Err(Error::NotStarted);
            }
            self.state = LayoutState::Running;
            self.alpha = x;
            self.trigger(LayoutEvent {
                kind: EventKind::Start,
                alpha: x,
                stress: None,
            });
            self.kick()?;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.set_alpha(RESUME_ALPHA)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_alpha(0.0)
    }

    pub fn drag_start(&mut self, target: DragTarget) {
        match target {
            DragTarget::Node(v) => {
                if let Some(node) = self.nodes.get_mut(v) {
                    node.locked = Some(node.position());
                    node.fixed |= FIXED_DRAG;
                }
            }
            DragTarget::Group(g) => {
                let Some(group) = self.groups.get(g) else {
                    return;
                };
                let origin = group.bounds.center();
                self.store_offset(g, origin);
            }
        }
    }

    fn store_offset(&mut self, g: usize, origin: Point) {
        for k in 0..self.groups[g].leaves.len() {
            let v = &mut self.nodes[self.groups[g].leaves[k]];
            v.fixed |= FIXED_DRAG;
            v.locked = Some(v.position());
            v.drag_offset = Some(Point::new(v.x - origin.x, v.y - origin.y));
        }
        for k in 0..self.groups[g].groups.len() {
            let child = self.groups[g].groups[k];
            self.store_offset(child, origin);
        }
    }

    /// Moves the drag target's lock to `position`; group leaves keep their offsets.
    pub fn drag(&mut self, target: DragTarget, position: Point) {
        match target {
            DragTarget::Node(v) => {
                if let Some(node) = self.nodes.get_mut(v) {
                    node.locked = Some(position);
                }
            }
            DragTarget::Group(g) => {
                if g >= self.groups.len() {
                    return;
                }
                let group = &mut self.groups[g];
                if !group.bounds.is_empty() {
                    group.bounds.set_x_centre(position.x);
                    group.bounds.set_y_centre(position.y);
                }
                for k in 0..self.groups[g].leaves.len() {
                    let v = &mut self.nodes[self.groups[g].leaves[k]];
                    if let Some(o) = v.drag_offset {
                        v.locked = Some(Point::new(o.x + position.x, o.y + position.y));
                    }
                }
                for k in 0..self.groups[g].groups.len() {
                    let child = self.groups[g].groups[k];
                    self.drag(DragTarget::Group(child), position);
                }
            }
        }
    }

    /// Releases drag and hover pins; a caller pin stays.
    pub fn drag_end(&mut self, target: DragTarget) {
        match target {
            DragTarget::Node(v) => {
                if let Some(node) = self.nodes.get_mut(v) {
                    node.fixed &= !(FIXED_DRAG | FIXED_HOVER);
                }
            }
            DragTarget::Group(g) => {
                if g >= self.groups.len() {
                    return;
                }
                for k in 0..self.groups[g].leaves.len() {
                    let v = self.groups[g].leaves[k];
                    self.drag_end(DragTarget::Node(v));
                    self.nodes[v].drag_offset = None;
                }
                for k in 0..self.groups[g].groups.len() {
                    let child = self.groups[g].groups[k];
                    self.drag_end(DragTarget::Group(child));
                }
            }
        }
    }

    pub fn mouse_over(&mut self, v: usize) {
        if let Some(node) = self.nodes.get_mut(v) {
            node.fixed |= FIXED_HOVER;
            node.locked = Some(node.position());
        }
    }

    pub fn mouse_out(&mut self, v: usize) {
        if let Some(node) = self.nodes.get_mut(v) {
            node.fixed &= !FIXED_HOVER;
        }
    }

    /// Builds the visibility graph over the node boxes shrunk by `margin`.
    pub fn prepare_edge_routing(&mut self, margin: f64) {
        self.routing_margin = margin;
        let obstacles = self.nodes.iter().map(|v| v.bounds.inflate(-margin)).collect();
        self.visibility = Some(VisibilityGraph::new(obstacles));
    }

    fn inner_bounds(&self, v: usize) -> Rectangle {
        let b = self.nodes[v].bounds;
        let inner = b.inflate(-self.routing_margin);
        if inner.is_empty() { b } else { inner }
    }

    /// Polyline for `self.links()[link]` around the other nodes: the source boundary point,
    /// the bends, then the point `arrow_head` short of the target boundary.
    pub fn route_edge(&self, link: usize, arrow_head: f64) -> Result<Vec<Point>> {
        let vg = self.visibility.as_ref().ok_or(Error::RoutingNotPrepared)?;
        let l = self.links.get(link).ok_or(Error::MissingLink { index: link })?;
        for index in [l.source, l.target] {
            if index >= self.nodes.len() {
                return Err(Error::MissingNode { link, index });
            }
        }
        let (source, target) = (l.source, l.target);
        let port1 = self.nodes[source].position();
        let port2 = self.nodes[target].position();

        let mut vg2 = vg.clone();
        let start = vg2.add_point(port1, Some(source));
        let end = vg2.add_point(port2, Some(target));
        vg2.add_edge_if_visible(start, end, &[source, target]);

        let edges: Vec<(usize, usize, f64)> = vg2
            .edges
            .iter()
            .map(|e| (e.source, e.target, e.length))
            .collect();
        let path = Calculator::new(vg2.vertices.len(), edges).path_from_node_to_node(start, end);

        let source_bounds = self.inner_bounds(source);
        let target_bounds = self.inner_bounds(target);
        let bends: Vec<Point> = match &path {
            Some(p) if p.len() > 2 => p[1..p.len() - 1]
                .iter()
                .map(|&i| vg2.vertices[i].p)
                .collect(),
            _ => Vec::new(),
        };
        let (Some(&first), Some(&last)) = (bends.first(), bends.last()) else {
            let route = make_edge_between(&source_bounds, &target_bounds, arrow_head);
            return Ok(vec![route.source_intersection, route.arrow_start]);
        };
        let mut line = Vec::with_capacity(bends.len() + 2);
        line.push(source_bounds.ray_intersection(first).unwrap_or(port1));
        line.extend(bends);
        line.push(make_edge_to(last, &target_bounds, arrow_head));
        Ok(line)
    }

    /// Replaces the groups by a power-graph decomposition of the links.
    pub fn power_graph_groups(&mut self) -> Result<PowerGraph> {
        self.ensure_nodes();
        self.validate_links()?;
        let link_type = |l: &Link| self.link_type_of(l);
        let pg = power_graph::get_groups(self.nodes.len(), &self.links, &link_type);
        self.groups = pg.groups.clone();
        self.resolve_groups()?;
        Ok(pg)
    }
}

fn copy_positions(descent: &Descent, nodes: &mut [Node]) {
    for (i, v) in nodes.iter_mut().enumerate() {
        v.x = descent.x[0][i];
        v.y = descent.x[1][i];
        v.update_bounds();
    }
}
