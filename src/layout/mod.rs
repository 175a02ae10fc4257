//! Automatic placement of the visible subgraph.
//!
//! Every algorithm is a pure function of a [`LayoutInput`] and returns new
//! top-left positions; applying them to the model is the caller's job.

mod circular;
mod expansion;
mod force;
mod grid;
mod tree;
pub(crate) mod types;

pub use circular::circular_layout;
pub use expansion::ExpandedSet;
pub use force::force_layout;
pub use grid::grid_layout;
pub use tree::tree_layout;
pub use types::*;

use tracing::debug;

use crate::config::LayoutConfig;

pub fn compute_layout(
    algorithm: LayoutAlgorithm,
    input: &LayoutInput<'_>,
    config: &LayoutConfig,
) -> LayoutResult {
    let (positions, iterations) = match algorithm {
        LayoutAlgorithm::Tree => (tree_layout(input, &config.tree), 0),
        LayoutAlgorithm::Force => force_layout(input, &config.force),
        LayoutAlgorithm::Grid => (grid_layout(input, &config.grid), 0),
        LayoutAlgorithm::Circular => (circular_layout(input, &config.circular), 0),
    };
    debug!(
        algorithm = algorithm.as_str(),
        nodes = input.nodes.len(),
        placed = positions.len(),
        iterations,
        "computed layout"
    );
    LayoutResult {
        algorithm,
        positions,
        iterations,
    }
}
