use std::collections::{BTreeMap, HashMap, HashSet};

use super::{LayoutInput, TreeDirection};
use crate::config::TreeLayoutConfig;
use crate::geometry::Point;
use crate::model::Node;

struct Forest<'a> {
    roots: Vec<&'a Node>,
    children: HashMap<&'a str, Vec<&'a Node>>,
}

impl<'a> Forest<'a> {
    fn build(input: &LayoutInput<'a>) -> Self {
        let present: HashSet<&str> = input.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut roots = Vec::new();
        let mut children: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in &input.nodes {
            match node.parent_id.as_deref() {
                Some(parent) if present.contains(parent) && parent != node.id => {
                    let open = input.focus == Some(parent) || input.expanded.contains(parent);
                    if open {
                        children.entry(parent).or_default().push(*node);
                    }
                }
                _ => roots.push(*node),
            }
        }
        Self { roots, children }
    }

    fn children(&self, id: &str) -> &[&'a Node] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn extents(node: &Node, direction: TreeDirection) -> (f32, f32) {
    match direction {
        TreeDirection::Horizontal => (node.width, node.height),
        TreeDirection::Vertical => (node.height, node.width),
    }
}

/// Tidy tree over the expanded part of the forest. Each subtree reserves
/// `max(own extent, children's spans + gaps)` along the sibling axis and the
/// node is centered in that span.
pub fn tree_layout(
    input: &LayoutInput<'_>,
    config: &TreeLayoutConfig,
) -> BTreeMap<String, Point> {
    let direction = input.direction;
    let layer_gap = config.layer_gap(direction);
    let sibling_gap = config.sibling_gap(direction);
    let forest = Forest::build(input);

    // Pre-order walk, then sizes bottom-up over its reverse.
    let mut order: Vec<&Node> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&Node> = forest.roots.iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id.as_str()) {
            continue;
        }
        order.push(node);
        stack.extend(forest.children(&node.id).iter().rev().copied());
    }

    let mut span: HashMap<&str, f32> = HashMap::new();
    for node in order.iter().rev() {
        let (_, own) = extents(node, direction);
        let kids = forest.children(&node.id);
        let total = kids
            .iter()
            .filter_map(|child| span.get(child.id.as_str()))
            .map(|size| size + sibling_gap)
            .sum::<f32>()
            - if kids.is_empty() { 0.0 } else { sibling_gap };
        span.insert(node.id.as_str(), own.max(total));
    }

    let mut positions = BTreeMap::new();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut pending: Vec<(&Node, f32, f32)> = Vec::new();
    let (primary_start, mut cursor) = match direction {
        TreeDirection::Horizontal => (config.start_x, config.start_y),
        TreeDirection::Vertical => (config.start_y, config.start_x),
    };
    for root in forest.roots.iter().copied() {
        pending.push((root, primary_start, cursor));
        cursor += span.get(root.id.as_str()).copied().unwrap_or(0.0) + sibling_gap * 2.0;
    }

    while let Some((node, primary, secondary)) = pending.pop() {
        if !placed.insert(node.id.as_str()) {
            continue;
        }
        let (own_primary, own_secondary) = extents(node, direction);
        let available = span.get(node.id.as_str()).copied().unwrap_or(own_secondary);
        let centered = secondary + (available - own_secondary) / 2.0;
        let point = match direction {
            TreeDirection::Horizontal => Point::new(primary, centered),
            TreeDirection::Vertical => Point::new(centered, primary),
        };
        positions.insert(node.id.clone(), point);

        let kids = forest.children(&node.id);
        if kids.is_empty() {
            continue;
        }
        let kids_total = kids
            .iter()
            .map(|child| span.get(child.id.as_str()).copied().unwrap_or(0.0))
            .sum::<f32>()
            + sibling_gap * (kids.len() - 1) as f32;
        let child_primary = primary + own_primary + layer_gap;
        let mut child_secondary = secondary + (available - kids_total) / 2.0;
        for child in kids.iter().copied() {
            pending.push((child, child_primary, child_secondary));
            child_secondary += span.get(child.id.as_str()).copied().unwrap_or(0.0) + sibling_gap;
        }
    }

    positions
}
