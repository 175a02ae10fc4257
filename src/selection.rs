//! Selection state plus the geometric edits that act on it: dragging with
//! alignment guides, box select, resize, align and distribute.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{EditorError, EditorResult};
use crate::geometry::{Point, Rect, Size};
use crate::graph::GraphModel;
use crate::model::Node;

/// Selected nodes, or a single selected edge. Selecting one kind clears the
/// other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: BTreeSet<String>,
    edge: Option<String>,
}

impl Selection {
    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }

    pub fn edge(&self) -> Option<&str> {
        self.edge.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edge.is_none()
    }

    /// The only selected node, if exactly one is selected.
    pub fn single(&self) -> Option<&str> {
        match self.nodes.len() {
            1 => self.nodes.iter().next().map(String::as_str),
            _ => None,
        }
    }

    pub fn replace<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edge = None;
        self.nodes = ids.into_iter().map(Into::into).collect();
    }

    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edge = None;
        self.nodes.extend(ids.into_iter().map(Into::into));
    }

    /// Adds or removes one node; returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        self.edge = None;
        if self.nodes.remove(id) {
            false
        } else {
            self.nodes.insert(id.to_string());
            true
        }
    }

    pub fn select_edge(&mut self, id: impl Into<String>) {
        self.nodes.clear();
        self.edge = Some(id.into());
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edge = None;
    }

    /// Forgets ids that no longer exist in `graph`.
    pub fn retain_existing(&mut self, graph: &GraphModel) {
        self.nodes.retain(|id| graph.contains_node(id));
        if self.edge.as_deref().is_some_and(|id| graph.edge(id).is_none()) {
            self.edge = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuideAxis {
    /// A vertical line at `x = position`.
    Vertical,
    /// A horizontal line at `y = position`.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Guide {
    pub axis: GuideAxis,
    pub position: f32,
}

struct AxisSnap {
    offset: f32,
    line: f32,
}

/// Snaps `moving` against `others` on each axis independently. Per axis the
/// candidate lines are center, leading edge and trailing edge; the closest
/// one within `threshold` wins.
pub fn snap_to_guides<'a, I>(moving: Rect, others: I, threshold: f32) -> (Point, Vec<Guide>)
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut best_x: Option<AxisSnap> = None;
    let mut best_y: Option<AxisSnap> = None;
    let consider = |best: &mut Option<AxisSnap>, mine: f32, theirs: f32| {
        let delta = theirs - mine;
        if delta.abs() <= threshold && best.as_ref().is_none_or(|b| delta.abs() < b.offset.abs()) {
            *best = Some(AxisSnap {
                offset: delta,
                line: theirs,
            });
        }
    };
    for other in others {
        let r = other.rect();
        let c = r.center();
        let mc = moving.center();
        consider(&mut best_x, mc.x, c.x);
        consider(&mut best_x, moving.x, r.x);
        consider(&mut best_x, moving.right(), r.right());
        consider(&mut best_y, mc.y, c.y);
        consider(&mut best_y, moving.y, r.y);
        consider(&mut best_y, moving.bottom(), r.bottom());
    }

    let mut at = Point::new(moving.x, moving.y);
    let mut guides = Vec::new();
    if let Some(snap) = best_x {
        at.x += snap.offset;
        guides.push(Guide {
            axis: GuideAxis::Vertical,
            position: snap.line,
        });
    }
    if let Some(snap) = best_y {
        at.y += snap.offset;
        guides.push(Guide {
            axis: GuideAxis::Horizontal,
            position: snap.line,
        });
    }
    (at, guides)
}

/// A drag in progress. Each node's offset from the pointer is fixed at drag
/// start; the model is untouched until the drag commits.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    offsets: BTreeMap<String, Point>,
    sizes: BTreeMap<String, Size>,
    start: Point,
    preview: BTreeMap<String, Point>,
    guides: Vec<Guide>,
}

impl DragState {
    pub fn begin(graph: &GraphModel, ids: &BTreeSet<String>, pointer: Point) -> Self {
        let mut offsets = BTreeMap::new();
        let mut sizes = BTreeMap::new();
        let mut preview = BTreeMap::new();
        for node in graph.nodes().iter().filter(|n| ids.contains(&n.id)) {
            offsets.insert(node.id.clone(), Point::new(pointer.x - node.x, pointer.y - node.y));
            sizes.insert(node.id.clone(), Size::new(node.width, node.height));
            preview.insert(node.id.clone(), node.position());
        }
        Self {
            offsets,
            sizes,
            start: pointer,
            preview,
            guides: Vec::new(),
        }
    }

    pub fn is_batch(&self) -> bool {
        self.offsets.len() > 1
    }

    /// Recomputes preview positions. Guides apply only to single-node drags;
    /// `others` are the snap candidates (typically the other visible nodes).
    pub fn update<'a, I>(&mut self, pointer: Point, others: I, threshold: f32)
    where
        I: IntoIterator<Item = &'a Node>,
    {
        self.guides.clear();
        for (id, offset) in &self.offsets {
            self.preview
                .insert(id.clone(), Point::new(pointer.x - offset.x, pointer.y - offset.y));
        }
        if self.is_batch() {
            return;
        }
        let Some((id, at)) = self.preview.iter().next().map(|(id, at)| (id.clone(), *at)) else {
            return;
        };
        let size = self.sizes.get(&id).copied().unwrap_or_default();
        let moving = Rect::new(at.x, at.y, size.width, size.height);
        let others = others.into_iter().filter(|n| n.id != id);
        let (snapped, guides) = snap_to_guides(moving, others, threshold);
        self.preview.insert(id, snapped);
        self.guides = guides;
    }

    pub fn preview(&self) -> &BTreeMap<String, Point> {
        &self.preview
    }

    pub fn guides(&self) -> &[Guide] {
        &self.guides
    }

    pub fn start(&self) -> Point {
        self.start
    }

    /// Final positions, or `None` when nothing moved.
    pub fn finish(self, graph: &GraphModel) -> Option<BTreeMap<String, Point>> {
        let moved = self
            .preview
            .iter()
            .any(|(id, at)| graph.node(id).is_some_and(|n| n.position() != *at));
        moved.then_some(self.preview)
    }
}

/// Rubber-band selection in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSelect {
    pub start: Point,
    pub current: Point,
    pub additive: bool,
}

impl BoxSelect {
    pub fn new(start: Point, additive: bool) -> Self {
        Self {
            start,
            current: start,
            additive,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.current)
    }

    /// Nodes whose center lies inside the box (inclusive).
    pub fn hits<'a, I>(&self, nodes: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let rect = self.rect();
        nodes
            .into_iter()
            .filter(|n| rect.contains(n.center()))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Applies the box to `selection`: union when additive, else replace.
    pub fn apply<'a, I>(&self, nodes: I, selection: &mut Selection)
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let hits = self.hits(nodes);
        if self.additive {
            selection.extend(hits);
        } else {
            selection.replace(hits);
        }
    }
}

/// Bottom-right handle drag on a single node. Sizes are floored at the
/// minimum while previewing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeState {
    pub node_id: String,
    start: Point,
    start_size: Size,
    min: Size,
    preview: Size,
}

impl ResizeState {
    pub fn begin(node: &Node, pointer: Point, min: Size) -> Self {
        let size = Size::new(node.width, node.height);
        Self {
            node_id: node.id.clone(),
            start: pointer,
            start_size: size,
            min,
            preview: size,
        }
    }

    pub fn update(&mut self, pointer: Point) {
        self.preview = Size::new(
            (self.start_size.width + pointer.x - self.start.x).max(self.min.width),
            (self.start_size.height + pointer.y - self.start.y).max(self.min.height),
        );
    }

    pub fn preview(&self) -> Size {
        self.preview
    }

    pub fn changed(&self) -> bool {
        self.preview != self.start_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

fn selected<'a>(graph: &'a GraphModel, ids: &BTreeSet<String>) -> Vec<&'a Node> {
    graph.nodes().iter().filter(|n| ids.contains(&n.id)).collect()
}

/// New positions lining the selection up on one edge or on the centroid.
pub fn align(
    graph: &GraphModel,
    ids: &BTreeSet<String>,
    alignment: Alignment,
) -> EditorResult<BTreeMap<String, Point>> {
    let nodes = selected(graph, ids);
    if nodes.len() < 2 {
        return Err(EditorError::SelectionTooSmall {
            required: 2,
            actual: nodes.len(),
        });
    }
    let count = nodes.len() as f32;
    let min_x = nodes.iter().map(|n| n.x).fold(f32::INFINITY, f32::min);
    let max_right = nodes.iter().map(|n| n.x + n.width).fold(f32::NEG_INFINITY, f32::max);
    let min_y = nodes.iter().map(|n| n.y).fold(f32::INFINITY, f32::min);
    let max_bottom = nodes.iter().map(|n| n.y + n.height).fold(f32::NEG_INFINITY, f32::max);
    let center_x = nodes.iter().map(|n| n.x + n.width / 2.0).sum::<f32>() / count;
    let center_y = nodes.iter().map(|n| n.y + n.height / 2.0).sum::<f32>() / count;

    Ok(nodes
        .into_iter()
        .map(|n| {
            let at = match alignment {
                Alignment::Left => Point::new(min_x, n.y),
                Alignment::Center => Point::new(center_x - n.width / 2.0, n.y),
                Alignment::Right => Point::new(max_right - n.width, n.y),
                Alignment::Top => Point::new(n.x, min_y),
                Alignment::Middle => Point::new(n.x, center_y - n.height / 2.0),
                Alignment::Bottom => Point::new(n.x, max_bottom - n.height),
            };
            (n.id.clone(), at)
        })
        .collect())
}

/// Equal gaps between neighbours along `axis`; the two outermost nodes stay put.
pub fn distribute(
    graph: &GraphModel,
    ids: &BTreeSet<String>,
    axis: Axis,
) -> EditorResult<BTreeMap<String, Point>> {
    let mut nodes = selected(graph, ids);
    if nodes.len() < 3 {
        return Err(EditorError::SelectionTooSmall {
            required: 3,
            actual: nodes.len(),
        });
    }
    let lead = |n: &Node| match axis {
        Axis::Horizontal => n.x,
        Axis::Vertical => n.y,
    };
    let extent = |n: &Node| match axis {
        Axis::Horizontal => n.width,
        Axis::Vertical => n.height,
    };
    nodes.sort_by(|a, b| lead(*a).total_cmp(&lead(*b)));
    let first = lead(nodes[0]);
    let last = nodes[nodes.len() - 1];
    let span = lead(last) + extent(last) - first;
    let occupied: f32 = nodes.iter().map(|n| extent(*n)).sum();
    let gap = (span - occupied) / (nodes.len() - 1) as f32;

    let mut cursor = first;
    let mut out = BTreeMap::new();
    for n in nodes {
        let at = match axis {
            Axis::Horizontal => Point::new(cursor, n.y),
            Axis::Vertical => Point::new(n.x, cursor),
        };
        out.insert(n.id.clone(), at);
        cursor += extent(n) + gap;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeDraft;

    fn graph_with(xs: &[f32], width: f32) -> (GraphModel, BTreeSet<String>) {
        let mut graph = GraphModel::new();
        let mut ids = BTreeSet::new();
        for (i, x) in xs.iter().enumerate() {
            let draft = NodeDraft::at(*x, i as f32 * 100.0, Size::new(width, 40.0));
            ids.insert(graph.add_node(draft).unwrap().id);
        }
        (graph, ids)
    }

    #[test]
    fn align_left_uses_minimum() {
        let (graph, ids) = graph_with(&[10.0, 50.0, 90.0], 40.0);
        let out = align(&graph, &ids, Alignment::Left).unwrap();
        assert!(out.values().all(|p| p.x == 10.0));
    }

    #[test]
    fn align_right_and_center() {
        let (graph, ids) = graph_with(&[0.0, 100.0], 40.0);
        let right = align(&graph, &ids, Alignment::Right).unwrap();
        assert!(right.values().all(|p| p.x == 100.0));
        let center = align(&graph, &ids, Alignment::Center).unwrap();
        assert!(center.values().all(|p| p.x == 50.0));
    }

    #[test]
    fn align_needs_two() {
        let (graph, ids) = graph_with(&[10.0], 40.0);
        assert_eq!(
            align(&graph, &ids, Alignment::Top),
            Err(EditorError::SelectionTooSmall {
                required: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn distribute_keeps_extremes() {
        let (graph, ids) = graph_with(&[0.0, 30.0, 200.0], 20.0);
        let out = distribute(&graph, &ids, Axis::Horizontal).unwrap();
        let mut xs: Vec<f32> = out.values().map(|p| p.x).collect();
        xs.sort_by(f32::total_cmp);
        assert_eq!(xs, vec![0.0, 100.0, 200.0]);
    }

    #[test]
    fn distribute_needs_three() {
        let (graph, ids) = graph_with(&[0.0, 30.0], 20.0);
        assert!(distribute(&graph, &ids, Axis::Vertical).is_err());
    }

    #[test]
    fn single_drag_snaps_to_nearest_line() {
        let others = vec![Node::new("other", 200.0, 0.0, 100.0, 50.0)];
        let moving = Rect::new(195.0, 300.0, 100.0, 50.0);
        let (at, guides) = snap_to_guides(moving, &others, 8.0);
        assert_eq!(at, Point::new(200.0, 300.0));
        assert_eq!(
            guides,
            vec![Guide {
                axis: GuideAxis::Vertical,
                position: 250.0
            }]
        );
    }

    #[test]
    fn batch_drag_moves_rigidly_without_snapping() {
        let (graph, ids) = graph_with(&[0.0, 300.0], 100.0);
        let mut drag = DragState::begin(&graph, &ids, Point::new(10.0, 10.0));
        drag.update(Point::new(13.0, 15.0), graph.nodes(), 8.0);
        assert!(drag.guides().is_empty());
        for node in graph.nodes() {
            assert_eq!(drag.preview()[&node.id], node.position().offset(3.0, 5.0));
        }
        let result = drag.finish(&graph).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn drag_without_motion_commits_nothing() {
        let (graph, ids) = graph_with(&[0.0], 100.0);
        let mut drag = DragState::begin(&graph, &ids, Point::new(10.0, 10.0));
        drag.update(Point::new(10.0, 10.0), graph.nodes(), 8.0);
        assert!(drag.finish(&graph).is_none());
    }

    #[test]
    fn box_select_uses_centers() {
        let nodes = vec![
            Node::new("in", 0.0, 0.0, 100.0, 50.0),
            Node::new("out", 150.0, 0.0, 100.0, 50.0),
        ];
        let mut selection = Selection::default();
        selection.replace(["out"]);
        let mut band = BoxSelect::new(Point::new(120.0, 60.0), false);
        band.current = Point::new(-10.0, -10.0);
        band.apply(&nodes, &mut selection);
        assert_eq!(selection.node_ids(), vec!["in".to_string()]);

        selection.replace(["out"]);
        BoxSelect {
            additive: true,
            ..band
        }
        .apply(&nodes, &mut selection);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn resize_preview_is_floored() {
        let node = Node::new("n", 0.0, 0.0, 100.0, 50.0);
        let mut resize = ResizeState::begin(&node, Point::new(100.0, 50.0), Size::new(60.0, 30.0));
        resize.update(Point::new(0.0, 0.0));
        assert_eq!(resize.preview(), Size::new(60.0, 30.0));
        resize.update(Point::new(150.0, 80.0));
        assert_eq!(resize.preview(), Size::new(150.0, 80.0));
        assert!(resize.changed());
    }

    #[test]
    fn edge_and_node_selection_are_exclusive() {
        let mut selection = Selection::default();
        selection.replace(["a", "b"]);
        selection.select_edge("e1");
        assert_eq!(selection.len(), 0);
        assert_eq!(selection.edge(), Some("e1"));
        selection.toggle("a");
        assert_eq!(selection.edge(), None);
        assert_eq!(selection.single(), Some("a"));
    }
}
