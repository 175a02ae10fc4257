use std::collections::BTreeMap;

use super::LayoutInput;
use crate::config::GridLayoutConfig;
use crate::geometry::Point;

/// Row-major placement in input order on a `ceil(sqrt(n))`-column grid whose
/// cells fit the largest node plus spacing.
pub fn grid_layout(input: &LayoutInput<'_>, config: &GridLayoutConfig) -> BTreeMap<String, Point> {
    let mut out = BTreeMap::new();
    if input.nodes.is_empty() {
        return out;
    }
    let cols = (input.nodes.len() as f32).sqrt().ceil() as usize;
    let max_width = input.nodes.iter().map(|n| n.width).fold(0.0f32, f32::max);
    let max_height = input.nodes.iter().map(|n| n.height).fold(0.0f32, f32::max);
    let cell_width = max_width + config.spacing_x;
    let cell_height = max_height + config.spacing_y;

    for (index, node) in input.nodes.iter().enumerate() {
        let col = index % cols;
        let row = index / cols;
        out.insert(
            node.id.clone(),
            Point::new(
                config.start_x + col as f32 * cell_width,
                config.start_y + row as f32 * cell_height,
            ),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ExpandedSet, TreeDirection};
    use crate::model::Node;

    #[test]
    fn five_nodes_make_three_columns() {
        let nodes: Vec<Node> = (0..5)
            .map(|i| Node::new(format!("n{i}"), 0.0, 0.0, 100.0 + i as f32 * 10.0, 50.0))
            .collect();
        let expanded = ExpandedSet::default();
        let input = LayoutInput {
            nodes: nodes.iter().collect(),
            edges: Vec::new(),
            focus: None,
            expanded: &expanded,
            direction: TreeDirection::Horizontal,
        };
        let positions = grid_layout(&input, &GridLayoutConfig::default());

        assert_eq!(positions["n0"], Point::new(100.0, 100.0));
        assert_eq!(positions["n2"], Point::new(100.0 + 2.0 * 190.0, 100.0));
        assert_eq!(positions["n3"], Point::new(100.0, 200.0));
    }
}
