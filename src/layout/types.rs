use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ExpandedSet;
use crate::geometry::Point;
use crate::graph::VisibleSet;
use crate::model::{Edge, Node};

/// Axis along which depth grows in the tree layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreeDirection {
    /// Depth grows left to right, siblings stack top to bottom.
    #[default]
    Horizontal,
    /// Depth grows top to bottom, siblings run left to right.
    Vertical,
}

impl TreeDirection {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "horizontal" | "lr" => Some(Self::Horizontal),
            "vertical" | "tb" | "td" => Some(Self::Vertical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutAlgorithm {
    Tree,
    Force,
    Grid,
    Circular,
}

impl LayoutAlgorithm {
    pub const ALL: [LayoutAlgorithm; 4] = [
        LayoutAlgorithm::Tree,
        LayoutAlgorithm::Force,
        LayoutAlgorithm::Grid,
        LayoutAlgorithm::Circular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutAlgorithm::Tree => "tree",
            LayoutAlgorithm::Force => "force",
            LayoutAlgorithm::Grid => "grid",
            LayoutAlgorithm::Circular => "circular",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == token.to_ascii_lowercase())
    }
}

/// The subgraph handed to a layout algorithm.
#[derive(Debug, Clone)]
pub struct LayoutInput<'a> {
    pub nodes: Vec<&'a Node>,
    pub edges: Vec<&'a Edge>,
    pub focus: Option<&'a str>,
    pub expanded: &'a ExpandedSet,
    pub direction: TreeDirection,
}

impl<'a> LayoutInput<'a> {
    pub fn from_visible(
        visible: &VisibleSet<'a>,
        focus: Option<&'a str>,
        expanded: &'a ExpandedSet,
        direction: TreeDirection,
    ) -> Self {
        Self {
            nodes: visible.nodes.clone(),
            edges: visible.edges.clone(),
            focus,
            expanded,
            direction,
        }
    }
}

/// New top-left positions keyed by node id. Nodes missing from the map keep
/// their current position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub algorithm: LayoutAlgorithm,
    pub positions: BTreeMap<String, Point>,
    /// Simulation steps actually run; zero for the closed-form algorithms.
    pub iterations: usize,
}

impl LayoutResult {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }
}
