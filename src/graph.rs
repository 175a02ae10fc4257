//! The node/edge/group store and its parent/child forest.
//!
//! Nodes live in a flat `Vec` in z-order (later entries draw on top) and point
//! at their parent by id. Every mutation validates before it writes, so a
//! rejected call leaves the model untouched.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{EditorError, EditorResult};
use crate::geometry::{Point, Rect, Size, bounds_of};
use crate::layout::ExpandedSet;
use crate::model::{
    Anchor, AttachPosition, Edge, EdgeEnd, EdgeStyle, EdgeStylePatch, Group, LayerType, LineStyle,
    LineType, Node, NodeShape, ProjectContent, fresh_id, is_valid_color,
};
use crate::theme::Theme;

/// Size assigned on load to nodes that arrive without usable dimensions.
pub const LOAD_FALLBACK_SIZE: Size = Size {
    width: 150.0,
    height: 50.0,
};
const CHILD_OFFSET_X: f32 = 80.0;
const CHILD_STEP_Y: f32 = 70.0;
const ANNOTATION_GAP: f32 = 16.0;

/// Everything needed to create a node except its id.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub name: Option<String>,
    pub shape: NodeShape,
    pub color: Option<String>,
    pub parent_id: Option<String>,
    pub layer_type: Option<LayerType>,
}

impl NodeDraft {
    pub fn at(x: f32, y: f32, size: Size) -> Self {
        Self {
            x,
            y,
            width: size.width,
            height: size.height,
            name: None,
            shape: NodeShape::default(),
            color: None,
            parent_id: None,
            layer_type: None,
        }
    }
}

/// What `from_parts` had to repair in a loaded project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeReport {
    pub dropped_nodes: usize,
    pub dropped_edges: usize,
    pub repositioned: usize,
    pub resized: usize,
    pub cleared_parents: usize,
    pub cleared_attachments: usize,
    pub cleared_colors: usize,
    pub recreated_groups: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// The nodes and edges of the current drill-down layer.
#[derive(Debug, Clone, Default)]
pub struct VisibleSet<'a> {
    pub nodes: Vec<&'a Node>,
    pub edges: Vec<&'a Edge>,
}

impl VisibleSet<'_> {
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    pub fn node_ids(&self) -> BTreeSet<String> {
        self.nodes.iter().map(|node| node.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    groups: Vec<Group>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a model from untrusted parts, repairing what can be repaired and
    /// dropping what cannot.
    pub fn from_parts(content: ProjectContent, theme: &Theme) -> (Self, SanitizeReport) {
        let mut report = SanitizeReport::default();
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(content.nodes.len());

        for (index, mut node) in content.nodes.into_iter().enumerate() {
            if node.id.is_empty() || !seen.insert(node.id.clone()) {
                report.dropped_nodes += 1;
                continue;
            }
            if !node.x.is_finite() || !node.y.is_finite() {
                node.x = 100.0 + (index % 5) as f32 * 180.0;
                node.y = 100.0 + (index / 5) as f32 * 100.0;
                report.repositioned += 1;
            }
            let usable = |v: f32| v.is_finite() && v > 0.0;
            if !usable(node.width) || !usable(node.height) {
                node.width = LOAD_FALLBACK_SIZE.width;
                node.height = LOAD_FALLBACK_SIZE.height;
                report.resized += 1;
            }
            if node.color.as_deref().is_some_and(|c| !is_valid_color(c)) {
                node.color = None;
                report.cleared_colors += 1;
            }
            nodes.push(node);
        }

        let mut graph = GraphModel {
            nodes,
            edges: Vec::new(),
            groups: Vec::new(),
        };

        // Dangling references first, then cycles over what remains.
        let ids: HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        for node in &mut graph.nodes {
            if node
                .parent_id
                .as_ref()
                .is_some_and(|p| !ids.contains(p) || *p == node.id)
            {
                node.parent_id = None;
                report.cleared_parents += 1;
            }
            if node
                .attached_to
                .as_ref()
                .is_some_and(|h| !ids.contains(h) || *h == node.id)
            {
                node.attached_to = None;
                report.cleared_attachments += 1;
            }
        }
        for index in 0..graph.nodes.len() {
            let id = graph.nodes[index].id.clone();
            if graph.on_parent_cycle(&id) {
                graph.nodes[index].parent_id = None;
                report.cleared_parents += 1;
            }
        }

        let mut group_ids = HashSet::new();
        for mut group in content.groups {
            if !group_ids.insert(group.id.clone()) {
                continue;
            }
            if !is_valid_color(&group.color) {
                group.color = theme.group_color(graph.groups.len()).to_string();
            }
            graph.groups.push(group);
        }
        let referenced: Vec<String> = graph
            .nodes
            .iter()
            .filter_map(|n| n.group_id.clone())
            .collect();
        for group_id in referenced {
            if group_ids.insert(group_id.clone()) {
                let index = graph.groups.len();
                graph.groups.push(Group {
                    id: group_id,
                    name: format!("Group {}", index + 1),
                    color: theme.group_color(index).to_string(),
                });
                report.recreated_groups += 1;
            }
        }

        let mut edge_ids = HashSet::new();
        for mut edge in content.edges {
            let valid = ids.contains(&edge.from)
                && ids.contains(&edge.to)
                && edge.from != edge.to
                && !edge.id.is_empty()
                && edge_ids.insert(edge.id.clone())
                && !graph.has_connection(&edge.from, edge.from_anchor, &edge.to, edge.to_anchor);
            if !valid {
                report.dropped_edges += 1;
                continue;
            }
            if edge.color.as_deref().is_some_and(|c| !is_valid_color(c)) {
                edge.color = None;
                report.cleared_colors += 1;
            }
            graph.edges.push(edge);
        }

        if !report.is_clean() {
            warn!(?report, "sanitized loaded project");
        }
        (graph, report)
    }

    pub fn to_content(&self) -> ProjectContent {
        ProjectContent {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            groups: self.groups.clone(),
        }
    }

    /// Replaces the whole graph with a snapshot taken from this model.
    pub fn restore(&mut self, content: ProjectContent) {
        self.nodes = content.nodes;
        self.edges = content.edges;
        self.groups = content.groups;
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    fn node_mut(&mut self, id: &str) -> EditorResult<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| EditorError::UnknownNode(id.to_string()))
    }

    fn require_node(&self, id: &str) -> EditorResult<&Node> {
        self.node(id)
            .ok_or_else(|| EditorError::UnknownNode(id.to_string()))
    }

    fn has_connection(&self, from: &str, from_anchor: Anchor, to: &str, to_anchor: Anchor) -> bool {
        self.edges
            .iter()
            .any(|e| e.same_connection(from, from_anchor, to, to_anchor))
    }

    pub fn add_node(&mut self, draft: NodeDraft) -> EditorResult<Node> {
        let id = fresh_id("node");
        if !(draft.x.is_finite() && draft.y.is_finite()) {
            return Err(EditorError::InvalidGeometry(id));
        }
        if !(draft.width.is_finite() && draft.height.is_finite())
            || draft.width <= 0.0
            || draft.height <= 0.0
        {
            return Err(EditorError::InvalidGeometry(id));
        }
        if let Some(parent) = draft.parent_id.as_deref() {
            self.require_node(parent)?;
        }
        let mut node = Node::new(id, draft.x, draft.y, draft.width, draft.height);
        node.name = draft
            .name
            .unwrap_or_else(|| format!("Node {}", self.nodes.len() + 1));
        node.shape = draft.shape;
        node.color = draft.color.filter(|c| is_valid_color(c));
        node.parent_id = draft.parent_id;
        node.layer_type = draft.layer_type;
        debug!(id = %node.id, "add node");
        self.nodes.push(node.clone());
        Ok(node)
    }

    /// Inserts a fully formed node, keeping its id. Used by paste.
    pub fn insert_node(&mut self, node: Node) -> EditorResult<()> {
        if self.contains_node(&node.id) {
            return Err(EditorError::DuplicateId(node.id));
        }
        let finite = node.x.is_finite() && node.y.is_finite() && node.width.is_finite() && node.height.is_finite();
        if !finite || node.width <= 0.0 || node.height <= 0.0 {
            return Err(EditorError::InvalidGeometry(node.id));
        }
        if let Some(parent) = node.parent_id.as_deref() {
            self.require_node(parent)?;
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Inserts nodes and edges together; parents and edge endpoints may refer
    /// to nodes in the same batch. Nothing is inserted if any record is bad.
    pub fn insert_batch(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> EditorResult<()> {
        let mut staged = self.clone();
        let mut pending = nodes;
        // Parents first: keep inserting whatever is resolvable until stuck.
        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();
            for node in pending {
                let ready = node
                    .parent_id
                    .as_deref()
                    .is_none_or(|p| staged.contains_node(p));
                if ready {
                    staged.insert_node(node)?;
                } else {
                    blocked.push(node);
                }
            }
            if blocked.len() == before {
                let parent = blocked[0].parent_id.clone().unwrap_or_default();
                return Err(EditorError::UnknownNode(parent));
            }
            pending = blocked;
        }
        for edge in edges {
            staged.insert_edge(edge)?;
        }
        *self = staged;
        Ok(())
    }

    /// Creates a child to the right of `parent`, stacked under earlier
    /// children, and connects parent.right to child.left.
    pub fn add_child(&mut self, parent_id: &str) -> EditorResult<(Node, Edge)> {
        let parent = self.require_node(parent_id)?.clone();
        let siblings = self.children_of(parent_id).len();
        let mut draft = NodeDraft::at(
            parent.x + parent.width + CHILD_OFFSET_X,
            parent.y + siblings as f32 * CHILD_STEP_Y,
            Size::new(parent.width, parent.height),
        );
        draft.name = Some(format!("Child {}", siblings + 1));
        draft.shape = parent.shape;
        draft.color = parent.color.clone();
        draft.parent_id = Some(parent.id.clone());
        let child = self.add_node(draft)?;
        let style = EdgeStyle {
            line_type: LineType::ArrowEnd,
            line_style: LineStyle::Solid,
            color: parent.color.clone(),
        };
        let edge = self.add_edge(&parent.id, Anchor::Right, &child.id, Anchor::Left, &style)?;
        Ok((child, edge))
    }

    pub fn add_edge(
        &mut self,
        from: &str,
        from_anchor: Anchor,
        to: &str,
        to_anchor: Anchor,
        style: &EdgeStyle,
    ) -> EditorResult<Edge> {
        self.check_connection(from, from_anchor, to, to_anchor)?;
        let edge = Edge {
            id: fresh_id("edge"),
            from: from.to_string(),
            from_anchor,
            to: to.to_string(),
            to_anchor,
            line_type: style.line_type,
            line_style: style.line_style,
            color: style.color.clone().filter(|c| is_valid_color(c)),
        };
        debug!(id = %edge.id, from, to, "add edge");
        self.edges.push(edge.clone());
        Ok(edge)
    }

    /// Inserts a fully formed edge, keeping its id. Used by paste.
    pub fn insert_edge(&mut self, edge: Edge) -> EditorResult<()> {
        if self.edge(&edge.id).is_some() {
            return Err(EditorError::DuplicateId(edge.id));
        }
        self.check_connection(&edge.from, edge.from_anchor, &edge.to, edge.to_anchor)?;
        self.edges.push(edge);
        Ok(())
    }

    fn check_connection(
        &self,
        from: &str,
        from_anchor: Anchor,
        to: &str,
        to_anchor: Anchor,
    ) -> EditorResult<()> {
        self.require_node(from)?;
        self.require_node(to)?;
        if from == to {
            return Err(EditorError::SelfLoop(from.to_string()));
        }
        if self.has_connection(from, from_anchor, to, to_anchor) {
            return Err(EditorError::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Re-binds one side of an existing edge.
    pub fn update_edge_endpoint(
        &mut self,
        edge_id: &str,
        end: EdgeEnd,
        node_id: &str,
        anchor: Anchor,
    ) -> EditorResult<()> {
        let edge = self
            .edge(edge_id)
            .ok_or_else(|| EditorError::UnknownEdge(edge_id.to_string()))?;
        let (other, other_anchor) = edge.endpoint(end.opposite());
        let (from, from_anchor, to, to_anchor) = match end {
            EdgeEnd::From => (node_id, anchor, other, other_anchor),
            EdgeEnd::To => (other, other_anchor, node_id, anchor),
        };
        self.require_node(node_id)?;
        if from == to {
            return Err(EditorError::SelfLoop(node_id.to_string()));
        }
        let duplicate = self
            .edges
            .iter()
            .any(|e| e.id != edge_id && e.same_connection(from, from_anchor, to, to_anchor));
        if duplicate {
            return Err(EditorError::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let (node_id, anchor) = (node_id.to_string(), anchor);
        if let Some(edge) = self.edges.iter_mut().find(|e| e.id == edge_id) {
            match end {
                EdgeEnd::From => {
                    edge.from = node_id;
                    edge.from_anchor = anchor;
                }
                EdgeEnd::To => {
                    edge.to = node_id;
                    edge.to_anchor = anchor;
                }
            }
        }
        Ok(())
    }

    pub fn set_edge_style(&mut self, edge_id: &str, patch: &EdgeStylePatch) -> EditorResult<()> {
        if let Some(color) = patch.color.as_deref() {
            if !is_valid_color(color) {
                return Err(EditorError::InvalidColor(color.to_string()));
            }
        }
        let edge = self
            .edges
            .iter_mut()
            .find(|e| e.id == edge_id)
            .ok_or_else(|| EditorError::UnknownEdge(edge_id.to_string()))?;
        if let Some(line_type) = patch.line_type {
            edge.line_type = line_type;
        }
        if let Some(line_style) = patch.line_style {
            edge.line_style = line_style;
        }
        if patch.color.is_some() {
            edge.color = patch.color.clone();
        }
        Ok(())
    }

    pub fn delete_edge(&mut self, edge_id: &str) -> EditorResult<Edge> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| EditorError::UnknownEdge(edge_id.to_string()))?;
        Ok(self.edges.remove(index))
    }

    /// Removes a node and every edge touching it. Children become roots and
    /// annotations pinned to it are unpinned; its group survives.
    pub fn delete_node(&mut self, id: &str) -> EditorResult<Node> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| EditorError::UnknownNode(id.to_string()))?;
        let removed = self.nodes.remove(index);
        self.edges.retain(|e| !e.touches(id));
        for node in &mut self.nodes {
            if node.parent_id.as_deref() == Some(id) {
                node.parent_id = None;
            }
            if node.attached_to.as_deref() == Some(id) {
                node.attached_to = None;
            }
        }
        debug!(id, "delete node");
        Ok(removed)
    }

    /// Removes a node together with all of its descendants.
    pub fn delete_subtree(&mut self, id: &str) -> EditorResult<Vec<Node>> {
        self.require_node(id)?;
        let mut doomed: Vec<String> = vec![id.to_string()];
        doomed.extend(self.subtree_of(id).into_iter().map(|n| n.id.clone()));
        let removed = self.delete_nodes(&doomed);
        debug!(id, count = removed.len(), "delete subtree");
        Ok(removed)
    }

    /// Bulk delete; unknown ids are skipped.
    pub fn delete_nodes(&mut self, ids: &[String]) -> Vec<Node> {
        ids.iter()
            .filter_map(|id| self.delete_node(id).ok())
            .collect()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.groups.clear();
    }

    pub fn move_node(&mut self, id: &str, x: f32, y: f32) -> EditorResult<()> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(EditorError::InvalidGeometry(id.to_string()));
        }
        let node = self.node_mut(id)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    /// Applies many positions at once; all ids are checked before anything moves.
    pub fn move_nodes<'a, I>(&mut self, positions: I) -> EditorResult<()>
    where
        I: IntoIterator<Item = (&'a str, Point)>,
    {
        let positions: Vec<(&str, Point)> = positions.into_iter().collect();
        for (id, point) in &positions {
            self.require_node(id)?;
            if !(point.x.is_finite() && point.y.is_finite()) {
                return Err(EditorError::InvalidGeometry(id.to_string()));
            }
        }
        for (id, point) in positions {
            self.move_node(id, point.x, point.y)?;
        }
        Ok(())
    }

    /// Rejects sizes below `min`; callers that want a floor clamp before calling.
    pub fn resize_node(&mut self, id: &str, width: f32, height: f32, min: Size) -> EditorResult<()> {
        if !(width.is_finite() && height.is_finite()) {
            return Err(EditorError::InvalidGeometry(id.to_string()));
        }
        if width < min.width || height < min.height {
            return Err(EditorError::UndersizedNode {
                width,
                height,
                min_width: min.width,
                min_height: min.height,
            });
        }
        let node = self.node_mut(id)?;
        node.width = width;
        node.height = height;
        Ok(())
    }

    pub fn rename_node(&mut self, id: &str, name: impl Into<String>) -> EditorResult<()> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_description(&mut self, id: &str, text: Option<String>) -> EditorResult<()> {
        self.node_mut(id)?.description = text.filter(|t| !t.is_empty());
        Ok(())
    }

    pub fn set_file_path(&mut self, id: &str, path: Option<String>) -> EditorResult<()> {
        self.node_mut(id)?.file_path = path.filter(|p| !p.is_empty());
        Ok(())
    }

    pub fn set_layer_type(&mut self, id: &str, layer: Option<LayerType>) -> EditorResult<()> {
        self.node_mut(id)?.layer_type = layer;
        Ok(())
    }

    pub fn set_shape(&mut self, id: &str, shape: NodeShape) -> EditorResult<()> {
        self.node_mut(id)?.shape = shape;
        Ok(())
    }

    /// `None` resets to the inherited default.
    pub fn set_color(&mut self, ids: &[String], color: Option<&str>) -> EditorResult<()> {
        if let Some(color) = color {
            if !is_valid_color(color) {
                return Err(EditorError::InvalidColor(color.to_string()));
            }
        }
        for id in ids {
            self.require_node(id)?;
        }
        for node in self.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            node.color = color.map(str::to_string);
        }
        Ok(())
    }

    /// Pins `note` to a corner of `host` and marks it as an annotation.
    pub fn attach_annotation(
        &mut self,
        note_id: &str,
        host_id: &str,
        position: AttachPosition,
    ) -> EditorResult<()> {
        if note_id == host_id {
            return Err(EditorError::SelfLoop(note_id.to_string()));
        }
        let host = self.require_node(host_id)?.rect();
        let note = self.node_mut(note_id)?;
        let at = annotation_position(host, Size::new(note.width, note.height), position);
        note.attached_to = Some(host_id.to_string());
        note.attach_position = Some(position);
        note.layer_type = Some(LayerType::Annotation);
        note.x = at.x;
        note.y = at.y;
        Ok(())
    }

    pub fn detach_annotation(&mut self, note_id: &str) -> EditorResult<()> {
        let note = self.node_mut(note_id)?;
        note.attached_to = None;
        note.attach_position = None;
        Ok(())
    }

    /// Moves every annotation pinned to `host_id` back onto its corner.
    pub fn repin_annotations(&mut self, host_id: &str) {
        let Some(host) = self.node(host_id).map(Node::rect) else {
            return;
        };
        for note in self
            .nodes
            .iter_mut()
            .filter(|n| n.attached_to.as_deref() == Some(host_id))
        {
            let position = note.attach_position.unwrap_or_default();
            let at = annotation_position(host, Size::new(note.width, note.height), position);
            note.x = at.x;
            note.y = at.y;
        }
    }

    pub fn children_of(&self, id: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.parent_id.as_deref() == Some(id))
            .collect()
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.parent_id.as_deref() == Some(id))
    }

    pub fn roots(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.parent_id.is_none()).collect()
    }

    /// Ids of every node that has at least one child.
    pub fn parents_with_children(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter_map(|n| n.parent_id.clone())
            .filter(|p| self.contains_node(p))
            .collect()
    }

    /// Nearest ancestor first.
    pub fn ancestors_of(&self, id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut current = self.node(id);
        while let Some(parent) = current
            .and_then(|n| n.parent_id.as_deref())
            .and_then(|p| self.node(p))
        {
            if out.len() > self.nodes.len() {
                break;
            }
            out.push(parent);
            current = Some(parent);
        }
        out
    }

    /// All transitive descendants, breadth first, excluding `id` itself.
    pub fn subtree_of(&self, id: &str) -> Vec<&Node> {
        let mut children: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in &self.nodes {
            if let Some(parent) = node.parent_id.as_deref() {
                children.entry(parent).or_default().push(node);
            }
        }
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = std::collections::VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in children.get(current).into_iter().flatten() {
                if seen.insert(child.id.as_str()) {
                    out.push(*child);
                    queue.push_back(child.id.as_str());
                }
            }
        }
        out
    }

    pub fn depth_of(&self, id: &str) -> usize {
        self.ancestors_of(id).len()
    }

    /// Root first, ending with `id`.
    pub fn path_to(&self, id: &str) -> Vec<String> {
        if !self.contains_node(id) {
            return Vec::new();
        }
        let mut path: Vec<String> = self
            .ancestors_of(id)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        path.reverse();
        path.push(id.to_string());
        path
    }

    /// Whether walking up from `id` comes back to `id`. A chain that runs
    /// into a loop further up does not count.
    fn on_parent_cycle(&self, id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.node(id).and_then(|n| n.parent_id.as_deref());
        while let Some(parent) = current {
            if parent == id {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.node(parent).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    /// Reparents `id`. Making a node the child of itself or of one of its own
    /// descendants is rejected.
    pub fn set_parent(&mut self, id: &str, parent: Option<&str>) -> EditorResult<()> {
        self.require_node(id)?;
        if let Some(parent) = parent {
            self.require_node(parent)?;
            let is_descendant = parent == id || self.ancestors_of(parent).iter().any(|a| a.id == id);
            if is_descendant {
                return Err(EditorError::ParentCycle {
                    node: id.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        self.node_mut(id)?.parent_id = parent.map(str::to_string);
        Ok(())
    }

    /// Reparents every descendant of `focus` directly under it.
    pub fn flatten_into(&mut self, focus: &str) -> EditorResult<usize> {
        self.require_node(focus)?;
        let descendants: HashSet<String> = self
            .subtree_of(focus)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        let mut changed = 0;
        for node in self.nodes.iter_mut().filter(|n| descendants.contains(&n.id)) {
            if node.parent_id.as_deref() != Some(focus) {
                node.parent_id = Some(focus.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// A node is visible when it is the focus, a direct child of the focus, or
    /// hangs below a direct child through ancestors that are all expanded.
    /// With no focus, forest roots play the role of the focus's children.
    pub fn is_visible(&self, node: &Node, focus: Option<&str>, expanded: &ExpandedSet) -> bool {
        if focus == Some(node.id.as_str()) || node.parent_id.as_deref() == focus {
            return true;
        }
        let mut current = node;
        for _ in 0..=self.nodes.len() {
            let Some(parent_id) = current.parent_id.as_deref() else {
                return false;
            };
            if !expanded.contains(parent_id) {
                return false;
            }
            let Some(parent) = self.node(parent_id) else {
                return false;
            };
            if parent.parent_id.as_deref() == focus {
                return true;
            }
            current = parent;
        }
        false
    }

    pub fn visible_set(&self, focus: Option<&str>, expanded: &ExpandedSet) -> VisibleSet<'_> {
        let nodes: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| self.is_visible(n, focus, expanded))
            .collect();
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| ids.contains(e.from.as_str()) && ids.contains(e.to.as_str()))
            .collect();
        VisibleSet { nodes, edges }
    }

    /// Color a node is drawn with: code nodes use the code color, feature
    /// nodes shade by depth, everything else uses its own color or the default.
    pub fn display_color<'a>(&'a self, node: &'a Node, theme: &'a Theme) -> &'a str {
        match node.layer_type {
            Some(LayerType::Code) => &theme.code_color,
            Some(LayerType::Feature) => theme.depth_color(self.depth_of(&node.id)),
            Some(LayerType::Annotation) => &theme.annotation_color,
            None => node.color.as_deref().unwrap_or(&theme.node_color),
        }
    }

    pub fn create_group(&mut self, ids: &[String], name: Option<String>, color: &str) -> EditorResult<Group> {
        let members: BTreeSet<&String> = ids.iter().collect();
        if members.len() < 2 {
            return Err(EditorError::SelectionTooSmall {
                required: 2,
                actual: members.len(),
            });
        }
        for id in &members {
            self.require_node(id)?;
        }
        let group = Group {
            id: fresh_id("group"),
            name: name.unwrap_or_else(|| format!("Group {}", self.groups.len() + 1)),
            color: if is_valid_color(color) {
                color.to_string()
            } else {
                crate::theme::DEFAULT_NODE_COLOR.to_string()
            },
        };
        for node in self.nodes.iter_mut().filter(|n| members.contains(&n.id)) {
            node.group_id = Some(group.id.clone());
        }
        self.groups.push(group.clone());
        self.prune_empty_groups();
        Ok(group)
    }

    /// Removes the label and clears membership; member nodes stay.
    pub fn dissolve_group(&mut self, group_id: &str) -> EditorResult<Group> {
        let index = self
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| EditorError::UnknownGroup(group_id.to_string()))?;
        for node in &mut self.nodes {
            if node.group_id.as_deref() == Some(group_id) {
                node.group_id = None;
            }
        }
        Ok(self.groups.remove(index))
    }

    pub fn rename_group(&mut self, group_id: &str, name: impl Into<String>) -> EditorResult<()> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| EditorError::UnknownGroup(group_id.to_string()))?;
        group.name = name.into();
        Ok(())
    }

    pub fn members_of(&self, group_id: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.group_id.as_deref() == Some(group_id))
            .collect()
    }

    /// The group whose members are exactly the selection, if any.
    pub fn group_fully_selected(&self, selected: &BTreeSet<String>) -> Option<&Group> {
        let mut group_id = None;
        for id in selected {
            let gid = self.node(id)?.group_id.as_deref()?;
            match group_id {
                None => group_id = Some(gid),
                Some(existing) if existing != gid => return None,
                Some(_) => {}
            }
        }
        let group_id = group_id?;
        let all_selected = self
            .members_of(group_id)
            .iter()
            .all(|n| selected.contains(&n.id));
        if all_selected {
            self.group(group_id)
        } else {
            None
        }
    }

    fn prune_empty_groups(&mut self) {
        let used: HashSet<String> = self.nodes.iter().filter_map(|n| n.group_id.clone()).collect();
        self.groups.retain(|g| used.contains(&g.id));
    }

    pub fn bounds(&self) -> Option<Rect> {
        bounds_of(self.nodes.iter().map(Node::rect))
    }
}

/// Where an annotation of `note` size sits when pinned to a corner of `host`.
/// Right-hand corners place it to the right of the host, left-hand corners to
/// the left, vertically centered on the corner.
pub fn annotation_position(host: Rect, note: Size, position: AttachPosition) -> Point {
    let right = host.right() + ANNOTATION_GAP;
    let left = host.x - note.width - ANNOTATION_GAP;
    let top = host.y - note.height / 2.0;
    let bottom = host.bottom() - note.height / 2.0;
    match position {
        AttachPosition::TopRight => Point::new(right, top),
        AttachPosition::BottomRight => Point::new(right, bottom),
        AttachPosition::BottomLeft => Point::new(left, bottom),
        AttachPosition::TopLeft => Point::new(left, top),
    }
}
