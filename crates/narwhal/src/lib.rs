#![forbid(unsafe_code)]

//! Headless constraint-based graph layout.
//!
//! Node positions come from stress majorization (gradient descent on the difference between
//! drawn and ideal distances). After every descent step the tentative positions are projected
//! onto the feasible set of separation and alignment constraints, and optionally of generated
//! non-overlap and group-containment constraints, with a VPSC solver.
//!
//! [`Layout`] drives a run: it validates the graph, runs the batch phases of
//! [`Layout::start`], then converges tick by tick, either in a blocking loop or driven by the
//! host (see [`Drive`]).

pub mod algo;
pub mod error;
pub mod geom;
pub mod graph;
pub mod layout;
pub mod overlap;
pub mod projection;

pub use algo::power_graph::{PowerEdge, PowerEnd, PowerGraph};
pub use error::{Error, Result};
pub use geom::{Point, Rectangle};
pub use graph::{
    AlignmentOffset, Axis, Constraint, Graph, Group, LayoutResult, Link, Node, RootGroup,
};
pub use layout::{
    DragTarget, Drive, EventKind, FlowLayout, Layout, LayoutEvent, LayoutOptions, LayoutSession,
    LayoutState, LinkLengths, StartOptions,
};
pub use overlap::remove_overlaps;
pub use projection::Projection;

/// Batch layout entry point. With `start.keep_running` the tick loop runs to convergence before
/// this returns; otherwise the result is the state right after the initial phases.
pub fn layout(graph: Graph, options: LayoutOptions, start: StartOptions) -> Result<LayoutResult> {
    let mut layout = Layout::with_options(LayoutOptions {
        drive: Drive::Blocking,
        ..options
    })
    .with_nodes(graph.nodes)
    .with_links(graph.links)
    .with_groups(graph.groups)
    .with_constraints(graph.constraints);
    layout.start(start)?;
    Ok(LayoutResult {
        nodes: layout.nodes().iter().map(Node::position).collect(),
        groups: layout.groups().iter().map(|g| g.bounds).collect(),
        stress: layout.last_stress(),
    })
}
