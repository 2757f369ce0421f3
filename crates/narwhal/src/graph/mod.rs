//! Graph records consumed and mutated by the layout driver.
//!
//! Nodes and groups live in flat arrays owned by the [`Layout`](crate::Layout); every reference
//! between them (link endpoints, group members, parent back-references) is an index into those
//! arrays.

use crate::geom::{Point, Rectangle};
use serde::{Deserialize, Serialize};

/// Pinned by the caller.
pub const FIXED_PINNED: u8 = 1;
/// Held by an in-progress drag.
pub const FIXED_DRAG: u8 = 2;
/// Held while the pointer hovers the node.
pub const FIXED_HOVER: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

fn unpositioned() -> f64 {
    f64::NAN
}

fn default_padding() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// `NaN` until the node has been positioned.
    #[serde(default = "unpositioned")]
    pub x: f64,
    #[serde(default = "unpositioned")]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Bitmask of `FIXED_*` flags; any set bit pins the node during a tick.
    #[serde(default)]
    pub fixed: u8,
    /// Overrides the solver weight of a fixed node (default 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_weight: Option<f64>,
    /// Position the node is pinned to while fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<Point>,
    #[serde(skip)]
    pub drag_offset: Option<Point>,
    #[serde(skip)]
    pub bounds: Rectangle,
    #[serde(skip)]
    pub index: usize,
    #[serde(skip)]
    pub parent: Option<usize>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
            width: None,
            height: None,
            fixed: 0,
            fixed_weight: None,
            locked: None,
            drag_offset: None,
            bounds: Rectangle::empty(),
            index: 0,
            parent: None,
        }
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn pinned(mut self) -> Self {
        self.fixed |= FIXED_PINNED;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed != 0
    }

    pub fn has_position(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Box of the node's size centred on its position; a node without a size is a point.
    pub fn rect_at(&self, x: f64, y: f64) -> Rectangle {
        let w2 = self.width.unwrap_or(0.0) / 2.0;
        let h2 = self.height.unwrap_or(0.0) / 2.0;
        Rectangle::new(x - w2, x + w2, y - h2, y + h2)
    }

    pub fn update_bounds(&mut self) {
        self.bounds = self.rect_at(self.x, self.y);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub source: usize,
    pub target: usize,
    /// Written by the link-length calculators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Link {
    pub fn new(source: usize, target: usize) -> Self {
        Self {
            source,
            target,
            length: None,
            weight: None,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    /// `"source-target"`.
    pub fn id(&self) -> String {
        format!("{}-{}", self.source, self.target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Indices of directly owned nodes.
    #[serde(default)]
    pub leaves: Vec<usize>,
    /// Indices of directly owned groups.
    #[serde(default)]
    pub groups: Vec<usize>,
    #[serde(default = "default_padding")]
    pub padding: f64,
    /// Solver weight of the group's extent variables (default 0.01).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stiffness: Option<f64>,
    #[serde(default)]
    pub bounds: Rectangle,
    #[serde(skip)]
    pub parent: Option<usize>,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            leaves: Vec::new(),
            groups: Vec::new(),
            padding: default_padding(),
            stiffness: None,
            bounds: Rectangle::empty(),
            parent: None,
        }
    }
}

impl Group {
    pub fn new(leaves: Vec<usize>, groups: Vec<usize>) -> Self {
        Self {
            leaves,
            groups,
            ..Self::default()
        }
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }
}

/// Top of the group tree: nodes and groups that have no parent group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootGroup {
    pub leaves: Vec<usize>,
    pub groups: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentOffset {
    pub node: usize,
    #[serde(default)]
    pub offset: f64,
}

/// Caller-supplied constraint between node positions on one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    /// `right - left >= gap`, or `== gap` when `equality` is set.
    Separation {
        axis: Axis,
        left: usize,
        right: usize,
        gap: f64,
        #[serde(default)]
        equality: bool,
    },
    /// Listed nodes keep fixed offsets from the first one.
    Alignment {
        axis: Axis,
        offsets: Vec<AlignmentOffset>,
    },
}

impl Constraint {
    pub fn separation(axis: Axis, left: usize, right: usize, gap: f64) -> Self {
        Constraint::Separation {
            axis,
            left,
            right,
            gap,
            equality: false,
        }
    }

    pub fn equality(axis: Axis, left: usize, right: usize, gap: f64) -> Self {
        Constraint::Separation {
            axis,
            left,
            right,
            gap,
            equality: true,
        }
    }

    pub fn alignment(axis: Axis, nodes: impl IntoIterator<Item = usize>) -> Self {
        Constraint::Alignment {
            axis,
            offsets: nodes
                .into_iter()
                .map(|node| AlignmentOffset { node, offset: 0.0 })
                .collect(),
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Constraint::Separation { axis, .. } | Constraint::Alignment { axis, .. } => *axis,
        }
    }

    /// Every node index the constraint refers to.
    pub fn nodes(&self) -> Vec<usize> {
        match self {
            Constraint::Separation { left, right, .. } => vec![*left, *right],
            Constraint::Alignment { offsets, .. } => offsets.iter().map(|o| o.node).collect(),
        }
    }
}

/// Graph document: everything a layout run consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub groups: Vec<Group>,
    pub constraints: Vec<Constraint>,
}

/// Positions produced by [`layout`](crate::layout()).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub nodes: Vec<Point>,
    /// Bounds of each input group, padding included.
    pub groups: Vec<Rectangle>,
    /// Squared displacement of the last descent step, if any step ran.
    pub stress: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraints_deserialize_from_both_shapes() {
        let sep: Constraint =
            serde_json::from_str(r#"{"axis":"x","left":0,"right":1,"gap":25}"#).expect("sep");
        assert_eq!(sep, Constraint::separation(Axis::X, 0, 1, 25.0));

        let align: Constraint = serde_json::from_str(
            r#"{"type":"alignment","axis":"y","offsets":[{"node":2,"offset":0},{"node":3,"offset":5}]}"#,
        )
        .expect("alignment");
        assert_eq!(align.axis(), Axis::Y);
        assert_eq!(align.nodes(), vec![2, 3]);
    }

    #[test]
    fn missing_coordinates_mean_unpositioned() {
        let n: Node = serde_json::from_str(r#"{"width":10,"height":5}"#).expect("node");
        assert!(!n.has_position());
        assert_eq!(n.rect_at(0.0, 0.0), Rectangle::new(-5.0, 5.0, -2.5, 2.5));
    }
}
