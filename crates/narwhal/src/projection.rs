//! Projection of tentative descent positions onto the feasible set of the user constraints and,
//! when overlap avoidance is on, the non-overlap and group-containment constraints.

use crate::algo::descent::Project;
use crate::algo::vpsc::{self, Solver, Variable};
use crate::error::{Error, Result};
use crate::graph::{Axis, Constraint, Group, Node, RootGroup};
use crate::overlap::{
    GroupVars, MIN_SEPARATION, SweepAxis, XSweep, YSweep, compute_group_bounds,
    generate_group_constraints,
};

const FIXED_WEIGHT: f64 = 1000.0;
const GROUP_STIFFNESS: f64 = 0.01;

/// Owns one solver variable per node and, with overlap avoidance over a group tree, two per
/// group. Node and group records are snapshots kept in step by the layout driver.
#[derive(Debug, Clone)]
pub struct Projection {
    nodes: Vec<Node>,
    groups: Vec<Group>,
    root: Option<RootGroup>,
    avoid_overlaps: bool,
    variables: Vec<Variable>,
    x_constraints: Vec<vpsc::Constraint>,
    y_constraints: Vec<vpsc::Constraint>,
}

impl Projection {
    pub fn new(
        mut nodes: Vec<Node>,
        mut groups: Vec<Group>,
        root: Option<RootGroup>,
        constraints: &[Constraint],
        avoid_overlaps: bool,
    ) -> Result<Self> {
        let mut variables: Vec<Variable> = nodes.iter().map(|_| Variable::new(0.0, 1.0)).collect();
        if avoid_overlaps {
            if let Some(root) = &root {
                for v in &mut nodes {
                    v.update_bounds();
                }
                compute_group_bounds(root, &mut groups, &nodes);
                for g in &groups {
                    let stiffness = g.stiffness.unwrap_or(GROUP_STIFFNESS);
                    variables.push(Variable::new(0.0, stiffness));
                    variables.push(Variable::new(0.0, stiffness));
                }
            }
        }
        let mut p = Self {
            nodes,
            groups,
            root,
            avoid_overlaps,
            variables,
            x_constraints: Vec::new(),
            y_constraints: Vec::new(),
        };
        p.create_constraints(constraints)?;
        Ok(p)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn constraints(&self, axis: Axis) -> &[vpsc::Constraint] {
        match axis {
            Axis::X => &self.x_constraints,
            Axis::Y => &self.y_constraints,
        }
    }

    /// Copies the pinning state (`fixed`, `locked`, `fixed_weight`) from the driver's nodes.
    pub fn sync_pins(&mut self, nodes: &[Node]) {
        for (mine, theirs) in self.nodes.iter_mut().zip(nodes) {
            mine.fixed = theirs.fixed;
            mine.locked = theirs.locked;
            mine.fixed_weight = theirs.fixed_weight;
        }
    }

    fn create_constraints(&mut self, constraints: &[Constraint]) -> Result<()> {
        let n = self.nodes.len();
        for c in constraints {
            if let Some(&index) = c.nodes().iter().find(|&&i| i >= n) {
                return Err(Error::ConstraintNode { index });
            }
        }
        for c in constraints {
            if let Constraint::Separation {
                axis,
                left,
                right,
                gap,
                equality,
            } = c
            {
                let vc = vpsc::Constraint::new(*left, *right, *gap, *equality);
                match axis {
                    Axis::X => self.x_constraints.push(vc),
                    Axis::Y => self.y_constraints.push(vc),
                }
            }
        }
        for c in constraints {
            if let Constraint::Alignment { axis, offsets } = c {
                let Some(first) = offsets.first() else {
                    continue;
                };
                self.make_feasible(*axis, offsets.iter().map(|o| o.node).collect());
                let cs = match axis {
                    Axis::X => &mut self.x_constraints,
                    Axis::Y => &mut self.y_constraints,
                };
                for o in &offsets[1..] {
                    cs.push(vpsc::Constraint::new(first.node, o.node, o.offset, true));
                }
            }
        }
        Ok(())
    }

    /// Nodes aligned on one axis are spread along the other so they start out disjoint.
    fn make_feasible(&mut self, axis: Axis, mut members: Vec<usize>) {
        if !self.avoid_overlaps {
            return;
        }
        let spread = axis.other();
        let coord = |v: &Node| match spread {
            Axis::X => v.x,
            Axis::Y => v.y,
        };
        members.sort_by(|&a, &b| coord(&self.nodes[a]).total_cmp(&coord(&self.nodes[b])));
        for pair in members.windows(2) {
            let (p, v) = (&self.nodes[pair[0]], &self.nodes[pair[1]]);
            let next = match spread {
                Axis::X => p.x + p.width.unwrap_or(0.0),
                Axis::Y => p.y + p.height.unwrap_or(0.0),
            };
            if next > coord(v) {
                let v = &mut self.nodes[pair[1]];
                match spread {
                    Axis::X => v.x = next,
                    Axis::Y => v.y = next,
                }
            }
        }
    }

    fn project(&mut self, axis: Axis, x0: &[f64], y0: &[f64], out: &mut [f64]) -> Result<()> {
        let n = self.nodes.len();
        let nv = self.variables.len();
        let mut start: Vec<f64> = match axis {
            Axis::X => x0.to_vec(),
            Axis::Y => y0.to_vec(),
        };
        let mut desired = out.to_vec();
        start.resize(nv.max(start.len()), 0.0);
        desired.resize(nv.max(desired.len()), 0.0);

        for (i, v) in self.nodes.iter_mut().enumerate() {
            if v.is_fixed() {
                self.variables[i].weight = v.fixed_weight.unwrap_or(FIXED_WEIGHT);
                if let Some(p) = v.locked {
                    desired[i] = match axis {
                        Axis::X => p.x,
                        Axis::Y => p.y,
                    };
                }
            } else {
                self.variables[i].weight = 1.0;
            }
            v.bounds = v.rect_at(x0[i], y0[i]);
        }

        let mut cs = self.constraints(axis).to_vec();
        let grouped = self.avoid_overlaps && self.root.is_some();
        let sweep: &dyn SweepAxis = match axis {
            Axis::X => &XSweep,
            Axis::Y => &YSweep,
        };
        if let (true, Some(root)) = (self.avoid_overlaps, &self.root) {
            compute_group_bounds(root, &mut self.groups, &self.nodes);
            cs.extend(generate_group_constraints(
                root,
                &self.groups,
                &self.nodes,
                sweep,
                MIN_SEPARATION,
                &mut desired,
            ));
        }

        let mut solver = Solver::new(self.variables.clone(), cs);
        solver.set_starting_positions(&start);
        solver.set_desired_positions(&desired);
        solver.solve()?;

        for (i, v) in self.nodes.iter_mut().enumerate() {
            let p = solver.position(i);
            out[i] = p;
            match axis {
                Axis::X => v.bounds.set_x_centre(p),
                Axis::Y => v.bounds.set_y_centre(p),
            }
        }
        if grouped && nv > n {
            let vars = GroupVars { node_count: n };
            for (gi, g) in self.groups.iter_mut().enumerate() {
                if g.bounds.is_empty() {
                    continue;
                }
                let (min_var, max_var) = (vars.min_var(gi), vars.max_var(gi));
                let min = solver.position(min_var);
                let max = solver.position(max_var);
                if let Some(o) = out.get_mut(min_var) {
                    *o = min;
                }
                if let Some(o) = out.get_mut(max_var) {
                    *o = max;
                }
                let p2 = g.padding / 2.0;
                match axis {
                    Axis::X => {
                        g.bounds.min_x = min - p2;
                        g.bounds.max_x = max + p2;
                    }
                    Axis::Y => {
                        g.bounds.min_y = min - p2;
                        g.bounds.max_y = max + p2;
                    }
                }
            }
            if let Some(root) = &self.root {
                compute_group_bounds(root, &mut self.groups, &self.nodes);
            }
        }
        Ok(())
    }
}

impl Project for Projection {
    fn project_x(&mut self, x0: &[f64], y0: &[f64], x: &mut [f64]) -> Result<()> {
        self.project(Axis::X, x0, y0, x)
    }

    fn project_y(&mut self, x0: &[f64], y0: &[f64], y: &mut [f64]) -> Result<()> {
        self.project(Axis::Y, x0, y0, y)
    }
}
