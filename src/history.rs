//! Linear undo/redo over whole-graph snapshots, and the copy/paste buffer.

use std::collections::{BTreeSet, HashMap};
use std::collections::VecDeque;

use tracing::debug;

use crate::error::EditorResult;
use crate::graph::GraphModel;
use crate::model::{Edge, Node, ProjectContent, fresh_id};

/// Snapshots of committed states. `cursor` points at the state currently
/// shown; recording after an undo drops everything past the cursor.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<ProjectContent>,
    cursor: usize,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Starts over with `snapshot` as the only state.
    pub fn reset(&mut self, snapshot: ProjectContent) {
        self.entries.clear();
        self.entries.push_back(snapshot);
        self.cursor = 0;
    }

    pub fn record(&mut self, snapshot: ProjectContent) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        debug!(depth = self.entries.len(), "recorded history entry");
    }

    /// Replaces the state at the cursor without adding an undo step.
    pub fn amend(&mut self, snapshot: ProjectContent) {
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = snapshot,
            None => self.reset(snapshot),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo(&mut self) -> Option<&ProjectContent> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&ProjectContent> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Clipboard {
    /// Selected nodes plus the edges running between them.
    pub fn copy_nodes(graph: &GraphModel, ids: &BTreeSet<String>) -> Self {
        let nodes: Vec<Node> = graph
            .nodes()
            .iter()
            .filter(|n| ids.contains(&n.id))
            .cloned()
            .collect();
        let edges = graph
            .edges()
            .iter()
            .filter(|e| ids.contains(&e.from) && ids.contains(&e.to))
            .cloned()
            .collect();
        Self { nodes, edges }
    }

    /// An edge on its own. Pasting it is a no-op since there is no node to
    /// attach it to.
    pub fn copy_edge(graph: &GraphModel, id: &str) -> Self {
        Self {
            nodes: Vec::new(),
            edges: graph.edge(id).cloned().into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Clones the buffer into `graph` with fresh ids, shifted by
    /// `(dx, dy)`. Internal references are remapped; references to nodes
    /// outside the buffer are kept when the node still exists. Returns the
    /// new node ids in buffer order.
    pub fn paste(&self, graph: &mut GraphModel, dx: f32, dy: f32) -> EditorResult<Vec<String>> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }
        let ids: HashMap<&str, String> = self
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), fresh_id("node")))
            .collect();
        let remap = |reference: &Option<String>| -> Option<String> {
            let old = reference.as_deref()?;
            match ids.get(old) {
                Some(new) => Some(new.clone()),
                None if graph.contains_node(old) => Some(old.to_string()),
                None => None,
            }
        };

        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut created = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut copy = node.clone();
            copy.id = ids[node.id.as_str()].clone();
            copy.x += dx;
            copy.y += dy;
            copy.parent_id = remap(&node.parent_id);
            copy.attached_to = remap(&node.attached_to);
            if copy.attached_to.is_none() {
                copy.attach_position = None;
            }
            if copy.group_id.as_deref().is_some_and(|g| graph.group(g).is_none()) {
                copy.group_id = None;
            }
            created.push(copy.id.clone());
            nodes.push(copy);
        }
        let edges = self
            .edges
            .iter()
            .filter_map(|edge| {
                let from = ids.get(edge.from.as_str())?;
                let to = ids.get(edge.to.as_str())?;
                Some(Edge {
                    id: fresh_id("edge"),
                    from: from.clone(),
                    to: to.clone(),
                    ..edge.clone()
                })
            })
            .collect();

        graph.insert_batch(nodes, edges)?;
        debug!(count = created.len(), "pasted nodes");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::graph::NodeDraft;
    use crate::model::{Anchor, EdgeStyle};
    use pretty_assertions::assert_eq;

    fn snapshot(tag: usize) -> ProjectContent {
        ProjectContent {
            nodes: vec![Node::new(format!("n{tag}"), tag as f32, 0.0, 10.0, 10.0)],
            edges: Vec::new(),
            groups: Vec::new(),
        }
    }

    #[test]
    fn undo_redo_walks_cursor() {
        let mut history = History::new(50);
        history.reset(snapshot(0));
        history.record(snapshot(1));
        history.record(snapshot(2));

        assert_eq!(history.undo(), Some(&snapshot(1)));
        assert_eq!(history.undo(), Some(&snapshot(0)));
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), Some(&snapshot(1)));

        history.record(snapshot(9));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo(), Some(&snapshot(1)));
    }

    #[test]
    fn amend_rewrites_current_state_in_place() {
        let mut history = History::new(50);
        history.amend(snapshot(0));
        assert_eq!(history.len(), 1);
        history.record(snapshot(1));
        history.amend(snapshot(7));

        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&snapshot(0)));
        assert_eq!(history.redo(), Some(&snapshot(7)));
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut history = History::new(3);
        history.reset(snapshot(0));
        for i in 1..=5 {
            history.record(snapshot(i));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo(), Some(&snapshot(4)));
        assert_eq!(history.undo(), Some(&snapshot(3)));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn paste_remaps_ids_and_keeps_internal_edges() {
        let mut graph = GraphModel::new();
        let size = Size::new(100.0, 50.0);
        let a = graph.add_node(NodeDraft::at(0.0, 0.0, size)).unwrap().id;
        let b = graph.add_node(NodeDraft::at(200.0, 40.0, size)).unwrap().id;
        let c = graph.add_node(NodeDraft::at(400.0, 0.0, size)).unwrap().id;
        let style = EdgeStyle::default();
        graph.add_edge(&a, Anchor::Right, &b, Anchor::Left, &style).unwrap();
        graph.add_edge(&b, Anchor::Right, &c, Anchor::Left, &style).unwrap();
        graph.set_parent(&b, Some(&a)).unwrap();

        let selected = BTreeSet::from([a.clone(), b.clone()]);
        let clipboard = Clipboard::copy_nodes(&graph, &selected);
        let pasted = clipboard.paste(&mut graph, 30.0, 30.0).unwrap();

        assert_eq!(pasted.len(), 2);
        assert!(pasted.iter().all(|id| !selected.contains(id)));
        assert_eq!(graph.nodes().len(), 5);
        assert_eq!(graph.edges().len(), 3);

        let new_a = graph.node(&pasted[0]).unwrap();
        let new_b = graph.node(&pasted[1]).unwrap();
        assert_eq!((new_a.x, new_a.y), (30.0, 30.0));
        assert_eq!((new_b.x - new_a.x, new_b.y - new_a.y), (200.0, 40.0));
        assert_eq!(new_b.parent_id.as_deref(), Some(new_a.id.as_str()));
        let internal = graph
            .edges()
            .iter()
            .filter(|e| pasted.contains(&e.from) || pasted.contains(&e.to))
            .count();
        assert_eq!(internal, 1);
    }

    #[test]
    fn edge_only_clipboard_pastes_nothing() {
        let mut graph = GraphModel::new();
        let size = Size::new(100.0, 50.0);
        let a = graph.add_node(NodeDraft::at(0.0, 0.0, size)).unwrap().id;
        let b = graph.add_node(NodeDraft::at(200.0, 0.0, size)).unwrap().id;
        let edge = graph
            .add_edge(&a, Anchor::Right, &b, Anchor::Left, &EdgeStyle::default())
            .unwrap();
        let clipboard = Clipboard::copy_edge(&graph, &edge.id);
        assert_eq!(clipboard.edges().len(), 1);
        assert!(clipboard.paste(&mut graph, 30.0, 30.0).unwrap().is_empty());
        assert_eq!(graph.edges().len(), 1);
    }
}
