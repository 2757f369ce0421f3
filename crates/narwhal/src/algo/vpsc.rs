//! Variable Placement with Separation Constraints.
//!
//! Finds positions minimising `sum w_i (x_i - d_i)^2` subject to `x_l + gap <= x_r` (or `==` for
//! equalities). Variables are grouped into blocks joined by active constraints; a block moves as
//! one rigid unit to the weighted mean of its members' desired positions. Blocks are merged on
//! violated constraints and split on constraints with a negative Lagrange multiplier until the
//! cost stops improving.

use crate::error::{Error, Result};

const LAGRANGIAN_TOLERANCE: f64 = -1e-4;
const ZERO_UPPERBOUND: f64 = -1e-10;
const COST_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct Variable {
    pub desired_position: f64,
    pub weight: f64,
    offset: f64,
    block: usize,
    c_in: Vec<usize>,
    c_out: Vec<usize>,
}

impl Variable {
    pub fn new(desired_position: f64, weight: f64) -> Self {
        Self {
            desired_position,
            weight,
            offset: 0.0,
            block: 0,
            c_in: Vec::new(),
            c_out: Vec::new(),
        }
    }
}

/// `left + gap <= right`, or `left + gap == right` when `equality` is set. `left`/`right` index
/// into the solver's variable list.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub left: usize,
    pub right: usize,
    pub gap: f64,
    pub equality: bool,
    lm: f64,
    active: bool,
    unsatisfiable: bool,
}

impl Constraint {
    pub fn new(left: usize, right: usize, gap: f64, equality: bool) -> Self {
        Self {
            left,
            right,
            gap,
            equality,
            lm: 0.0,
            active: false,
            unsatisfiable: false,
        }
    }

    pub fn separation(left: usize, right: usize, gap: f64) -> Self {
        Self::new(left, right, gap, false)
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PositionStats {
    ab: f64,
    ad: f64,
    a2: f64,
}

impl PositionStats {
    fn add_variable(&mut self, v: &Variable) {
        self.ab += v.weight * v.offset;
        self.ad += v.weight * v.desired_position;
        self.a2 += v.weight;
    }

    fn posn(&self) -> f64 {
        (self.ad - self.ab) / self.a2
    }
}

#[derive(Debug, Clone)]
struct Block {
    vars: Vec<usize>,
    posn: f64,
    ps: PositionStats,
    // Slot in `Solver::live`, `None` once merged away or split.
    slot: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Solver {
    vars: Vec<Variable>,
    cs: Vec<Constraint>,
    blocks: Vec<Block>,
    live: Vec<usize>,
    inactive: Vec<usize>,
}

impl Solver {
    pub fn new(mut vars: Vec<Variable>, mut cs: Vec<Constraint>) -> Self {
        for v in &mut vars {
            v.c_in.clear();
            v.c_out.clear();
        }
        for (i, c) in cs.iter_mut().enumerate() {
            c.active = false;
            c.unsatisfiable = false;
            vars[c.left].c_out.push(i);
            vars[c.right].c_in.push(i);
        }
        let mut s = Self {
            vars,
            cs,
            blocks: Vec::new(),
            live: Vec::new(),
            inactive: Vec::new(),
        };
        s.reset_blocks();
        s
    }

    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.cs
    }

    /// Starts again from singleton blocks placed at `ps`.
    pub fn set_starting_positions(&mut self, ps: &[f64]) {
        self.reset_blocks();
        for i in 0..self.vars.len() {
            if let Some(&p) = ps.get(i) {
                let b = self.vars[i].block;
                self.blocks[b].posn = p;
            }
        }
    }

    pub fn set_desired_positions(&mut self, ps: &[f64]) {
        for (v, &p) in self.vars.iter_mut().zip(ps) {
            v.desired_position = p;
        }
    }

    pub fn position(&self, v: usize) -> f64 {
        let var = &self.vars[v];
        self.blocks[var.block].posn + var.offset
    }

    pub fn positions(&self) -> Vec<f64> {
        (0..self.vars.len()).map(|i| self.position(i)).collect()
    }

    pub fn cost(&self) -> f64 {
        self.live
            .iter()
            .flat_map(|&b| self.blocks[b].vars.iter())
            .map(|&v| {
                let d = self.position(v) - self.vars[v].desired_position;
                d * d * self.vars[v].weight
            })
            .sum()
    }

    /// Runs `satisfy` until the cost settles. Fails if some constraint could not be satisfied.
    pub fn solve(&mut self) -> Result<f64> {
        self.satisfy();
        let mut last_cost = f64::MAX;
        let mut cost = self.cost();
        while (last_cost - cost).abs() > COST_TOLERANCE {
            self.satisfy();
            last_cost = cost;
            cost = self.cost();
        }
        if let Some(c) = self.cs.iter().find(|c| c.unsatisfiable) {
            tracing::warn!(
                left = c.left,
                right = c.right,
                gap = c.gap,
                "vpsc: unsatisfiable constraint"
            );
            return Err(Error::Unsatisfiable {
                left: c.left,
                right: c.right,
                gap: c.gap,
            });
        }
        Ok(cost)
    }

    /// Merges blocks across violated constraints until none remain, splitting where a merge
    /// would close a loop inside one block.
    pub fn satisfy(&mut self) {
        self.split_blocks();
        while let Some(c) = self.most_violated() {
            let violated = {
                let con = &self.cs[c];
                con.equality || (self.slack(c) < ZERO_UPPERBOUND && !con.active)
            };
            if !violated {
                break;
            }
            let (l, r) = (self.cs[c].left, self.cs[c].right);
            let lb = self.vars[l].block;
            let rb = self.vars[r].block;
            if lb != rb {
                self.merge(c);
                continue;
            }
            if self.is_active_directed_path_between(r, l) {
                self.cs[c].unsatisfiable = true;
                continue;
            }
            let Some(split) = self.find_min_lm_between(l, r) else {
                self.cs[c].unsatisfiable = true;
                continue;
            };
            self.split_block(lb, split);
            self.inactive.push(split);
            if self.slack(c) >= 0.0 {
                self.inactive.push(c);
            } else {
                self.merge(c);
            }
        }
    }

    fn reset_blocks(&mut self) {
        self.blocks.clear();
        self.live.clear();
        for v in 0..self.vars.len() {
            let b = self.new_block(v);
            self.insert(b);
        }
        self.inactive = (0..self.cs.len()).collect();
        for c in &mut self.cs {
            c.active = false;
        }
    }

    fn slack(&self, c: usize) -> f64 {
        let con = &self.cs[c];
        if con.unsatisfiable {
            return f64::MAX;
        }
        self.position(con.right) - con.gap - self.position(con.left)
    }

    fn dfdv(&self, v: usize) -> f64 {
        let var = &self.vars[v];
        2.0 * var.weight * (self.position(v) - var.desired_position)
    }

    /// Active constraints at `v`, paired with the variable on their far side, skipping `prev`.
    fn neighbours(&self, v: usize, prev: Option<usize>) -> Vec<(usize, usize)> {
        let var = &self.vars[v];
        let out = var.c_out.iter().map(|&c| (c, self.cs[c].right));
        let inc = var.c_in.iter().map(|&c| (c, self.cs[c].left));
        out.chain(inc)
            .filter(|&(c, next)| self.cs[c].active && Some(next) != prev)
            .collect()
    }

    fn new_block(&mut self, v: usize) -> usize {
        let id = self.blocks.len();
        self.vars[v].offset = 0.0;
        self.blocks.push(Block {
            vars: Vec::new(),
            posn: 0.0,
            ps: PositionStats::default(),
            slot: None,
        });
        self.add_variable(id, v);
        id
    }

    fn add_variable(&mut self, b: usize, v: usize) {
        self.vars[v].block = b;
        let block = &mut self.blocks[b];
        block.vars.push(v);
        block.ps.add_variable(&self.vars[v]);
        block.posn = block.ps.posn();
    }

    fn insert(&mut self, b: usize) {
        self.blocks[b].slot = Some(self.live.len());
        self.live.push(b);
    }

    fn remove(&mut self, b: usize) {
        let Some(slot) = self.blocks[b].slot.take() else {
            return;
        };
        self.live.swap_remove(slot);
        if let Some(&moved) = self.live.get(slot) {
            self.blocks[moved].slot = Some(slot);
        }
    }

    fn update_weighted_position(&mut self, b: usize) {
        let mut ps = PositionStats::default();
        for &v in &self.blocks[b].vars {
            ps.add_variable(&self.vars[v]);
        }
        let block = &mut self.blocks[b];
        block.ps = ps;
        block.posn = ps.posn();
    }

    /// Lagrange multipliers of the active constraints in the tree rooted at `v`. Returns the
    /// derivative of the cost of the subtree w.r.t. `v`.
    fn compute_lm(
        &mut self,
        v: usize,
        from: Option<usize>,
        visit: &mut dyn FnMut(&Constraint, usize),
    ) -> f64 {
        let mut dfdv = self.dfdv(v);
        for (c, next) in self.neighbours(v, from) {
            let d = self.compute_lm(next, Some(v), visit);
            dfdv += d;
            self.cs[c].lm = if next == self.cs[c].right { d } else { -d };
            visit(&self.cs[c], c);
        }
        dfdv
    }

    fn find_min_lm(&mut self, b: usize) -> Option<usize> {
        let root = *self.blocks[b].vars.first()?;
        let mut min: Option<(usize, f64)> = None;
        self.compute_lm(root, None, &mut |con, c| {
            if !con.equality && min.is_none_or(|(_, lm)| con.lm < lm) {
                min = Some((c, con.lm));
            }
        });
        min.map(|(c, _)| c)
    }

    fn find_min_lm_between(&mut self, lv: usize, rv: usize) -> Option<usize> {
        self.compute_lm(lv, None, &mut |_, _| {});
        let mut min: Option<(usize, f64)> = None;
        self.find_path(lv, None, rv, &mut |con, c, next| {
            if !con.equality && con.right == next && min.is_none_or(|(_, lm)| con.lm < lm) {
                min = Some((c, con.lm));
            }
        });
        min.map(|(c, _)| c)
    }

    fn find_path(
        &self,
        v: usize,
        prev: Option<usize>,
        to: usize,
        visit: &mut dyn FnMut(&Constraint, usize, usize),
    ) -> bool {
        let mut found = false;
        for (c, next) in self.neighbours(v, prev) {
            if !found && (next == to || self.find_path(next, Some(v), to, visit)) {
                found = true;
                visit(&self.cs[c], c, next);
            }
        }
        found
    }

    fn is_active_directed_path_between(&self, u: usize, v: usize) -> bool {
        if u == v {
            return true;
        }
        self.vars[u].c_out.iter().rev().any(|&c| {
            self.cs[c].active && self.is_active_directed_path_between(self.cs[c].right, v)
        })
    }

    /// Deactivates `c` and replaces block `b` by the two blocks on either side of it.
    fn split_block(&mut self, b: usize, c: usize) {
        self.cs[c].active = false;
        let (l, r) = (self.cs[c].left, self.cs[c].right);
        let lb = self.create_split_block(l);
        let rb = self.create_split_block(r);
        self.insert(lb);
        self.insert(rb);
        self.remove(b);
    }

    fn create_split_block(&mut self, start: usize) -> usize {
        let b = self.new_block(start);
        self.populate_split_block(b, start, None);
        b
    }

    fn populate_split_block(&mut self, b: usize, v: usize, prev: Option<usize>) {
        for (c, next) in self.neighbours(v, prev) {
            let gap = self.cs[c].gap;
            let offset = if next == self.cs[c].right {
                self.vars[v].offset + gap
            } else {
                self.vars[v].offset - gap
            };
            self.vars[next].offset = offset;
            self.add_variable(b, next);
            self.populate_split_block(b, next, Some(v));
        }
    }

    fn merge(&mut self, c: usize) {
        let con = &self.cs[c];
        let l = self.vars[con.left].block;
        let r = self.vars[con.right].block;
        let dist = self.vars[con.right].offset - self.vars[con.left].offset - con.gap;
        if self.blocks[l].vars.len() < self.blocks[r].vars.len() {
            self.merge_across(r, l, c, dist);
            self.remove(l);
        } else {
            self.merge_across(l, r, c, -dist);
            self.remove(r);
        }
    }

    fn merge_across(&mut self, into: usize, from: usize, c: usize, dist: f64) {
        self.cs[c].active = true;
        let moved = std::mem::take(&mut self.blocks[from].vars);
        for v in moved {
            self.vars[v].offset += dist;
            self.add_variable(into, v);
        }
        self.blocks[into].posn = self.blocks[into].ps.posn();
    }

    fn split_blocks(&mut self) {
        let snapshot = self.live.clone();
        for &b in &snapshot {
            self.update_weighted_position(b);
        }
        for b in snapshot {
            if self.blocks[b].slot.is_none() {
                continue;
            }
            let Some(c) = self.find_min_lm(b) else {
                continue;
            };
            if self.cs[c].lm < LAGRANGIAN_TOLERANCE {
                self.split_block(b, c);
                self.inactive.push(c);
            }
        }
    }

    fn most_violated(&mut self) -> Option<usize> {
        let mut min_slack = f64::MAX;
        let mut found: Option<(usize, usize)> = None;
        for (i, &c) in self.inactive.iter().enumerate() {
            let con = &self.cs[c];
            if con.unsatisfiable {
                continue;
            }
            let slack = self.slack(c);
            if con.equality || slack < min_slack {
                min_slack = slack;
                found = Some((i, c));
                if con.equality {
                    break;
                }
            }
        }
        let (i, c) = found?;
        let con = &self.cs[c];
        if (min_slack < ZERO_UPPERBOUND && !con.active) || con.equality {
            self.inactive.swap_remove(i);
        }
        Some(c)
    }
}
