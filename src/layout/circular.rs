use std::collections::BTreeMap;
use std::f32::consts::PI;

use super::LayoutInput;
use crate::config::CircularLayoutConfig;
use crate::geometry::Point;

/// Evenly spaced around a circle starting at twelve o'clock, clockwise. The
/// radius grows with node count so neighbors do not overlap. Node centers sit
/// on the circle.
pub fn circular_layout(
    input: &LayoutInput<'_>,
    config: &CircularLayoutConfig,
) -> BTreeMap<String, Point> {
    let mut out = BTreeMap::new();
    let center = Point::new(config.center_x, config.center_y);
    let n = input.nodes.len();
    if n == 0 {
        return out;
    }
    if n == 1 {
        let node = input.nodes[0];
        out.insert(
            node.id.clone(),
            Point::new(
                (center.x - node.width / 2.0).round(),
                (center.y - node.height / 2.0).round(),
            ),
        );
        return out;
    }

    let max_size = input
        .nodes
        .iter()
        .map(|node| node.width.max(node.height))
        .fold(0.0f32, f32::max);
    let radius = (n as f32 * (max_size + config.spacing) / (2.0 * PI)).max(config.min_radius);
    let step = 2.0 * PI / n as f32;

    for (index, node) in input.nodes.iter().enumerate() {
        let angle = -PI / 2.0 + index as f32 * step;
        let x = center.x + radius * angle.cos() - node.width / 2.0;
        let y = center.y + radius * angle.sin() - node.height / 2.0;
        out.insert(node.id.clone(), Point::new(x.round(), y.round()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ExpandedSet, TreeDirection};
    use crate::model::Node;

    fn run(count: usize) -> BTreeMap<String, Point> {
        let nodes: Vec<Node> = (0..count)
            .map(|i| Node::new(format!("n{i}"), 0.0, 0.0, 100.0, 40.0))
            .collect();
        let expanded = ExpandedSet::default();
        let input = LayoutInput {
            nodes: nodes.iter().collect(),
            edges: Vec::new(),
            focus: None,
            expanded: &expanded,
            direction: TreeDirection::Horizontal,
        };
        circular_layout(&input, &CircularLayoutConfig::default())
    }

    #[test]
    fn first_node_sits_at_the_top() {
        let positions = run(4);
        // radius = max(4 * 300 / 2pi, 200) ~= 190.99 -> 200
        assert_eq!(positions["n0"], Point::new(350.0, 80.0));
        assert_eq!(positions["n1"], Point::new(550.0, 280.0));
    }

    #[test]
    fn radius_grows_with_count() {
        let positions = run(12);
        let top = positions["n0"];
        let radius = 300.0 - (top.y + 20.0);
        assert!(radius > 200.0);
    }

    #[test]
    fn lone_node_is_centered() {
        let positions = run(1);
        assert_eq!(positions["n0"], Point::new(350.0, 280.0));
    }
}
