//! Stress majorization by gradient descent with Runge-Kutta steps.
//!
//! Positions live in one `DVector` per axis. Each step computes the stress gradient and the
//! per-axis Hessian from the ideal distance matrix `d` (optionally weighted by `g`), moves along
//! the gradient by the optimal step size, and hands the tentative positions to a [`Project`]
//! hook that may snap them back onto a feasible set.

use super::XorShift64Star;
use crate::error::Result;
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

/// Hook through which hard constraints are applied after each descent step.
///
/// `project_x` receives the pre-step positions `(x0, y0)` and the tentative x coordinates to fix
/// up in place; `project_y` receives the already-projected x and the tentative y coordinates.
pub trait Project {
    fn project_x(&mut self, x0: &[f64], y0: &[f64], x: &mut [f64]) -> Result<()>;
    fn project_y(&mut self, x0: &[f64], y0: &[f64], y: &mut [f64]) -> Result<()>;

    /// Whether projection does anything; the second, corrective half-step is skipped otherwise.
    fn is_active(&self) -> bool {
        true
    }
}

/// No constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl Project for Unconstrained {
    fn project_x(&mut self, _x0: &[f64], _y0: &[f64], _x: &mut [f64]) -> Result<()> {
        Ok(())
    }

    fn project_y(&mut self, _x0: &[f64], _y0: &[f64], _y: &mut [f64]) -> Result<()> {
        Ok(())
    }

    fn is_active(&self) -> bool {
        false
    }
}

impl<P: Project> Project for Option<P> {
    fn project_x(&mut self, x0: &[f64], y0: &[f64], x: &mut [f64]) -> Result<()> {
        match self {
            Some(p) => p.project_x(x0, y0, x),
            None => Ok(()),
        }
    }

    fn project_y(&mut self, x0: &[f64], y0: &[f64], y: &mut [f64]) -> Result<()> {
        match self {
            Some(p) => p.project_y(x0, y0, y),
            None => Ok(()),
        }
    }

    fn is_active(&self) -> bool {
        self.as_ref().is_some_and(|p| p.is_active())
    }
}

/// Positions pinned by index.
#[derive(Debug, Clone, Default)]
pub struct Locks {
    locks: FxHashMap<usize, [f64; 2]>,
}

impl Locks {
    pub fn add(&mut self, id: usize, p: [f64; 2]) {
        self.locks.insert(id, p);
    }

    pub fn clear(&mut self) {
        self.locks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<[f64; 2]> {
        self.locks.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, [f64; 2])> + '_ {
        self.locks.iter().map(|(&id, &p)| (id, p))
    }
}

type Positions = [DVector<f64>; 2];

#[derive(Debug, Clone)]
pub struct Descent {
    pub x: Positions,
    pub d: DMatrix<f64>,
    pub g: Option<DMatrix<f64>>,
    /// Relative stress change below which `run` stops early.
    pub threshold: f64,
    pub locks: Locks,
    /// The first `num_grid_snap_nodes` positions are attracted to a grid of `snap_grid_size`.
    pub num_grid_snap_nodes: usize,
    pub snap_grid_size: f64,
    pub snap_strength: f64,
    pub scale_snap_by_max_h: bool,
    n: usize,
    min_d: f64,
    h: [DMatrix<f64>; 2],
    grad: Positions,
    rng: XorShift64Star,
}

impl Descent {
    pub fn new(x: Positions, d: DMatrix<f64>) -> Self {
        let n = x[0].len();
        let mut min_d = f64::MAX;
        for i in 0..n {
            for j in (i + 1)..n {
                let v = d[(i, j)];
                if v > 0.0 && v < min_d {
                    min_d = v;
                }
            }
        }
        if min_d == f64::MAX {
            min_d = 1.0;
        }
        Self {
            x,
            d,
            g: None,
            threshold: 1e-4,
            locks: Locks::default(),
            num_grid_snap_nodes: 0,
            snap_grid_size: 100.0,
            snap_strength: 1000.0,
            scale_snap_by_max_h: false,
            n,
            min_d,
            h: [DMatrix::zeros(n, n), DMatrix::zeros(n, n)],
            grad: [DVector::zeros(n), DVector::zeros(n)],
            rng: XorShift64Star::new(1),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = XorShift64Star::new(seed);
        self
    }

    pub fn node_count(&self) -> usize {
        self.n
    }

    pub fn create_square_matrix(n: usize, f: impl FnMut(usize, usize) -> f64) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, f)
    }

    /// Random direction scaled to the smallest ideal distance, to pull coincident points apart.
    fn offset_dir(&mut self) -> [f64; 2] {
        let mut u = [0.0; 2];
        let mut l = 0.0;
        for v in &mut u {
            *v = self.rng.next_between(0.01, 1.0) - 0.5;
            l += *v * *v;
        }
        let l = l.sqrt();
        u.map(|v| v * self.min_d / l)
    }

    fn compute_derivatives(&mut self, x: &mut Positions) {
        let n = self.n;
        if n < 1 {
            return;
        }
        let mut max_h = 0.0f64;
        for u in 0..n {
            let mut huu = [0.0; 2];
            for i in 0..2 {
                self.grad[i][u] = 0.0;
            }
            for v in 0..n {
                if u == v {
                    continue;
                }
                let mut d = [0.0; 2];
                let mut d2 = [0.0; 2];
                let mut distance_squared;
                let mut attempts = n;
                loop {
                    distance_squared = 0.0;
                    for i in 0..2 {
                        let dx = x[i][u] - x[i][v];
                        d[i] = dx;
                        d2[i] = dx * dx;
                        distance_squared += d2[i];
                    }
                    if distance_squared > 1e-9 || attempts == 0 {
                        break;
                    }
                    attempts -= 1;
                    let rd = self.offset_dir();
                    for i in 0..2 {
                        x[i][v] += rd[i];
                    }
                }
                let distance = distance_squared.sqrt();
                let ideal = self.d[(u, v)];
                let mut weight = self.g.as_ref().map_or(1.0, |g| g[(u, v)]);
                // Pairs weighted above 1 only repel: once they are far enough apart, ignore them.
                if (weight > 1.0 && distance > ideal) || !ideal.is_finite() || ideal <= 0.0 {
                    for i in 0..2 {
                        self.h[i][(u, v)] = 0.0;
                    }
                    continue;
                }
                if weight > 1.0 {
                    weight = 1.0;
                }
                let ideal_squared = ideal * ideal;
                let gs = 2.0 * weight * (distance - ideal) / (ideal_squared * distance);
                let distance_cubed = distance_squared * distance;
                let hs = 2.0 * -weight / (ideal_squared * distance_cubed);
                for i in 0..2 {
                    self.grad[i][u] += d[i] * gs;
                    let huv = hs * (2.0 * distance_cubed + ideal * (d2[i] - distance_squared));
                    self.h[i][(u, v)] = huv;
                    huu[i] -= huv;
                }
            }
            for i in 0..2 {
                self.h[i][(u, u)] = huu[i];
                max_h = max_h.max(huu[i]);
            }
        }

        let r = self.snap_grid_size / 2.0;
        let grid = self.snap_grid_size;
        let k = self.snap_strength / (r * r);
        for u in 0..self.num_grid_snap_nodes.min(n) {
            for i in 0..2 {
                let xiu = x[i][u];
                let m = xiu / grid;
                let f = m % 1.0;
                let q = m - f;
                let dx = if f.abs() <= 0.5 {
                    xiu - q * grid
                } else if xiu > 0.0 {
                    xiu - (q + 1.0) * grid
                } else {
                    xiu - (q - 1.0) * grid
                };
                if -r < dx && dx <= r {
                    let s = if self.scale_snap_by_max_h { max_h * k } else { k };
                    self.grad[i][u] += s * dx;
                    self.h[i][(u, u)] += s;
                }
            }
        }

        for (u, p) in self.locks.iter() {
            if u >= n {
                continue;
            }
            for i in 0..2 {
                self.h[i][(u, u)] += max_h;
                self.grad[i][u] -= max_h * (p[i] - x[i][u]);
            }
        }
    }

    /// Optimal step length along `d` for the current quadratic model.
    fn compute_step_size(&self, d: &Positions) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for i in 0..2 {
            numerator += self.grad[i].dot(&d[i]);
            let hd = &self.h[i] * &d[i];
            denominator += d[i].dot(&hd);
        }
        if denominator == 0.0 || !denominator.is_finite() {
            return 0.0;
        }
        numerator / denominator
    }

    fn step_and_project(
        &self,
        x0: &Positions,
        r: &mut Positions,
        d: &Positions,
        step_size: f64,
        project: &mut dyn Project,
    ) -> Result<()> {
        r.clone_from(x0);
        r[0].axpy(-step_size, &d[0], 1.0);
        project.project_x(x0[0].as_slice(), x0[1].as_slice(), r[0].as_mut_slice())?;
        r[1].axpy(-step_size, &d[1], 1.0);
        let [rx, ry] = r;
        project.project_y(rx.as_slice(), x0[1].as_slice(), ry.as_mut_slice())?;
        Ok(())
    }

    fn compute_next_position(
        &mut self,
        x0: &mut Positions,
        project: &mut dyn Project,
    ) -> Result<Positions> {
        self.compute_derivatives(x0);
        let alpha = self.compute_step_size(&self.grad);
        let grad = self.grad.clone();
        let mut r = x0.clone();
        self.step_and_project(x0, &mut r, &grad, alpha, project)?;

        if project.is_active() {
            let e: Positions = [&x0[0] - &r[0], &x0[1] - &r[1]];
            let beta = self.compute_step_size(&e).clamp(0.2, 1.0);
            self.step_and_project(x0, &mut r, &e, beta, project)?;
        }
        Ok(r)
    }

    /// One classic RK4 step. Returns the squared displacement of all positions.
    pub fn runge_kutta(&mut self, project: &mut dyn Project) -> Result<f64> {
        let mut x0 = self.x.clone();
        let a = self.compute_next_position(&mut x0, project)?;
        let mut ia = mid(&x0, &a);
        let b = self.compute_next_position(&mut ia, project)?;
        let mut ib = mid(&x0, &b);
        let c = self.compute_next_position(&mut ib, project)?;
        let mut ic = c.clone();
        let d = self.compute_next_position(&mut ic, project)?;

        let mut next: Positions = [DVector::zeros(self.n), DVector::zeros(self.n)];
        for i in 0..2 {
            next[i] = (&a[i] + &b[i] * 2.0 + &c[i] * 2.0 + &d[i]) / 6.0;
        }
        self.pin_locked(&mut next);

        let mut disp = 0.0;
        for i in 0..2 {
            disp += (&x0[i] - &next[i]).norm_squared();
        }
        self.x = next;
        Ok(disp)
    }

    /// Plain gradient step without projection; returns the new stress.
    pub fn reduce_stress(&mut self) -> f64 {
        let mut x = self.x.clone();
        self.compute_derivatives(&mut x);
        let alpha = self.compute_step_size(&self.grad);
        for i in 0..2 {
            x[i].axpy(-alpha, &self.grad[i], 1.0);
        }
        self.pin_locked(&mut x);
        self.x = x;
        self.compute_stress()
    }

    /// Runs up to `iterations` RK steps, stopping once the relative change of the step
    /// displacement drops below `threshold`. Returns the last displacement.
    pub fn run(&mut self, iterations: usize, project: &mut dyn Project) -> Result<f64> {
        let mut stress = f64::MAX;
        let mut remaining = iterations;
        while remaining > 0 {
            remaining -= 1;
            let s = self.runge_kutta(project)?;
            let converged = (stress / s - 1.0).abs() < self.threshold;
            stress = s;
            if converged {
                break;
            }
        }
        Ok(stress)
    }

    pub fn compute_stress(&self) -> f64 {
        let mut stress = 0.0;
        for u in 0..self.n {
            for v in (u + 1)..self.n {
                let ideal = self.d[(u, v)];
                if !ideal.is_finite() || ideal <= 0.0 {
                    continue;
                }
                let dx = self.x[0][u] - self.x[0][v];
                let dy = self.x[1][u] - self.x[1][v];
                let l = (dx * dx + dy * dy).sqrt();
                let rl = ideal - l;
                stress += rl * rl / (ideal * ideal);
            }
        }
        stress
    }

    fn pin_locked(&self, x: &mut Positions) {
        for (u, p) in self.locks.iter() {
            if u < self.n {
                x[0][u] = p[0];
                x[1][u] = p[1];
            }
        }
    }
}

fn mid(a: &Positions, b: &Positions) -> Positions {
    [
        &a[0] + (&b[0] - &a[0]) / 2.0,
        &a[1] + (&b[1] - &a[1]) / 2.0,
    ]
}
