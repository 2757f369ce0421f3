use crate::graph::Axis;
use serde::{Deserialize, Serialize};

/// How ideal link lengths are derived from the graph structure.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LinkLengths {
    /// Every link uses the configured link distance.
    #[default]
    None,
    /// `ideal * (1 + weight * sqrt(|N(u) xor N(v)|))`.
    SymmetricDiff { ideal: f64, weight: f64 },
    /// `ideal * (1 + weight * jaccard(N(u), N(v)))`.
    Jaccard { ideal: f64, weight: f64 },
}

/// Directed links point along `axis`, at least `min_separation` apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowLayout {
    pub axis: Axis,
    pub min_separation: f64,
}

/// Who calls `tick()` once the layout is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Drive {
    /// `kick()` ticks until convergence before returning.
    #[default]
    Blocking,
    /// `kick()` returns immediately; the host calls `tick()`, e.g. once per frame.
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    /// `[width, height]` of the drawing area. Unpositioned nodes start at its centre.
    pub canvas_size: [f64; 2],
    /// Size assumed for nodes without one when packing components.
    pub default_node_size: f64,
    pub link_distance: f64,
    pub link_lengths: LinkLengths,
    pub convergence_threshold: f64,
    /// Strength of the pull between a group's extent variables.
    pub group_compactness: f64,
    pub avoid_overlaps: bool,
    pub handle_disconnected: bool,
    pub flow_layout: Option<FlowLayout>,
    /// Ideal distances between nodes, replacing the shortest-path matrix.
    pub distance_matrix: Option<Vec<Vec<f64>>>,
    pub drive: Drive,
    pub max_kick_ticks: usize,
    pub random_seed: u64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            canvas_size: [1.0, 1.0],
            default_node_size: 10.0,
            link_distance: 20.0,
            link_lengths: LinkLengths::None,
            convergence_threshold: 0.01,
            group_compactness: 1e-6,
            avoid_overlaps: false,
            handle_disconnected: true,
            flow_layout: None,
            distance_matrix: None,
            drive: Drive::Blocking,
            max_kick_ticks: 10_000,
            random_seed: 1,
        }
    }
}

/// Iteration budget of each phase of [`Layout::start`](crate::Layout::start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartOptions {
    pub unconstrained_iterations: usize,
    pub user_constraint_iterations: usize,
    pub all_constraints_iterations: usize,
    pub grid_snap_iterations: usize,
    /// Resume the tick loop after the initial phases.
    pub keep_running: bool,
    /// Centre packed components in the canvas.
    pub center_graph: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            unconstrained_iterations: 0,
            user_constraint_iterations: 0,
            all_constraints_iterations: 0,
            grid_snap_iterations: 0,
            keep_running: true,
            center_graph: true,
        }
    }
}

impl StartOptions {
    pub fn iterations(unconstrained: usize, user_constraints: usize, all_constraints: usize) -> Self {
        Self {
            unconstrained_iterations: unconstrained,
            user_constraint_iterations: user_constraints,
            all_constraints_iterations: all_constraints,
            ..Self::default()
        }
    }
}
