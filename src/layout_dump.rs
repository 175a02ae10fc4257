use crate::editor::Editor;
use crate::layout::{LayoutResult, TreeDirection};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Machine-readable snapshot of a layout pass, for diffing against fixtures.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub algorithm: String,
    pub direction: TreeDirection,
    pub iterations: usize,
    pub focus: Option<String>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub parent_id: Option<String>,
    /// Whether the pass assigned this node a position.
    pub placed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub path: String,
}

impl LayoutDump {
    /// Visible nodes and edges after `result` has been applied to `editor`.
    pub fn from_editor(editor: &Editor, result: &LayoutResult) -> Self {
        let graph = editor.graph();
        let visible = editor.visible();
        let nodes = visible
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                name: node.name.clone(),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                parent_id: node.parent_id.clone(),
                placed: result.positions.contains_key(&node.id),
            })
            .collect();
        let edges = visible
            .edges
            .iter()
            .filter_map(|edge| {
                let from = graph.node(&edge.from)?;
                let to = graph.node(&edge.to)?;
                Some(EdgeDump {
                    id: edge.id.clone(),
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    path: crate::connection::CubicPath::for_edge(edge, from, to).to_svg_path(),
                })
            })
            .collect();

        LayoutDump {
            algorithm: result.algorithm.as_str().to_string(),
            direction: editor.direction(),
            iterations: result.iterations,
            focus: editor.focus().map(str::to_string),
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, editor: &Editor, result: &LayoutResult) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_editor(editor, result);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutAlgorithm;
    use crate::model::{Node, Project};

    #[test]
    fn dump_lists_placed_nodes() {
        let mut editor = Editor::default();
        let mut project = Project::new("dump");
        let mut child = Node::new("c", 0.0, 0.0, 100.0, 50.0);
        child.parent_id = Some("p".into());
        project.nodes = vec![Node::new("p", 0.0, 0.0, 100.0, 50.0), child];
        editor.load(project);
        let result = editor.apply_layout(LayoutAlgorithm::Grid);

        let dump = LayoutDump::from_editor(&editor, &result);
        assert_eq!(dump.algorithm, "grid");
        assert_eq!(dump.nodes.len(), 2);
        assert!(dump.nodes.iter().all(|n| n.placed));

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["nodes"][1]["parentId"], "p");
        assert_eq!(json["direction"], "horizontal");
    }
}
