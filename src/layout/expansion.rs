use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::graph::GraphModel;

/// Nodes whose children are drawn inline under them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedSet(BTreeSet<String>);

impl ExpandedSet {
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn expand(&mut self, id: &str) {
        self.0.insert(id.to_string());
    }

    /// Collapses `id` and every descendant, so re-expanding starts from a
    /// clean slate. Walks an explicit worklist instead of recursing.
    pub fn collapse(&mut self, id: &str, graph: &GraphModel) {
        self.0.remove(id);
        let mut pending = vec![id.to_string()];
        let mut seen = BTreeSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for child in graph.children_of(&current) {
                self.0.remove(&child.id);
                pending.push(child.id.clone());
            }
        }
    }

    /// Returns whether the node is expanded afterwards.
    pub fn toggle(&mut self, id: &str, graph: &GraphModel) -> bool {
        if self.contains(id) {
            self.collapse(id, graph);
            false
        } else {
            self.expand(id);
            true
        }
    }

    pub fn expand_all(&mut self, graph: &GraphModel) {
        self.0 = graph.parents_with_children();
    }

    pub fn collapse_all(&mut self) {
        self.0.clear();
    }

    /// Drops ids that no longer name a node.
    pub fn retain_existing(&mut self, graph: &GraphModel) {
        self.0.retain(|id| graph.contains_node(id));
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::graph::NodeDraft;

    fn chain(graph: &mut GraphModel, depth: usize) -> Vec<String> {
        let mut ids = Vec::new();
        let mut parent: Option<String> = None;
        for _ in 0..depth {
            let mut draft = NodeDraft::at(0.0, 0.0, Size::new(100.0, 50.0));
            draft.parent_id = parent.clone();
            let id = graph.add_node(draft).unwrap().id;
            parent = Some(id.clone());
            ids.push(id);
        }
        ids
    }

    #[test]
    fn collapse_clears_descendants() {
        let mut graph = GraphModel::new();
        let ids = chain(&mut graph, 4);
        let mut expanded = ExpandedSet::default();
        expanded.expand_all(&graph);
        assert_eq!(expanded.len(), 3);

        assert!(!expanded.toggle(&ids[1], &graph));
        assert!(expanded.contains(&ids[0]));
        assert!(!expanded.contains(&ids[2]));

        assert!(expanded.toggle(&ids[1], &graph));
        assert!(!expanded.contains(&ids[2]));
    }

    #[test]
    fn deep_chain_collapses_without_recursion() {
        let mut graph = GraphModel::new();
        let ids = chain(&mut graph, 2_000);
        let mut expanded = ExpandedSet::default();
        expanded.expand_all(&graph);
        expanded.collapse(&ids[0], &graph);
        assert!(expanded.is_empty());
    }

    #[test]
    fn retain_existing_drops_deleted() {
        let mut graph = GraphModel::new();
        let ids = chain(&mut graph, 2);
        let mut expanded = ExpandedSet::default();
        expanded.expand(&ids[0]);
        graph.delete_node(&ids[0]).unwrap();
        expanded.retain_existing(&graph);
        assert!(expanded.is_empty());
    }
}
