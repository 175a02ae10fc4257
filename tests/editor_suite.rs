use std::path::Path;

use panorama_canvas::editor::{Editor, GestureKind, HitTarget};
use panorama_canvas::geometry::Point;
use panorama_canvas::graph::{GraphModel, SanitizeReport};
use panorama_canvas::input::PointerInput;
use panorama_canvas::layout::LayoutAlgorithm;
use panorama_canvas::model::{Anchor, LayerType, Node, Project, ProjectContent};
use panorama_canvas::render::render_editor_svg;
use panorama_canvas::selection::{Alignment, Axis};
use panorama_canvas::Config;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn fixture(name: &str) -> Project {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let raw = std::fs::read_to_string(&path).expect("fixture read failed");
    serde_json::from_str(&raw).expect("fixture parse failed")
}

fn manual_editor() -> Editor {
    let mut config = Config::default();
    config.canvas.auto_layout_on_load = false;
    Editor::new(config)
}

fn board(nodes: Vec<Node>) -> Project {
    let mut project = Project::new("suite");
    project.nodes = nodes;
    project
}

fn assert_integrity(graph: &GraphModel) {
    for edge in graph.edges() {
        assert!(graph.contains_node(&edge.from), "edge {} has dangling source", edge.id);
        assert!(graph.contains_node(&edge.to), "edge {} has dangling target", edge.id);
        assert_ne!(edge.from, edge.to, "edge {} is a self loop", edge.id);
    }
    for node in graph.nodes() {
        if let Some(parent) = &node.parent_id {
            assert!(graph.contains_node(parent), "node {} has dangling parent", node.id);
            assert!(!graph.ancestors_of(&node.id).iter().any(|a| a.id == node.id));
        }
        if let Some(host) = &node.attached_to {
            assert!(graph.contains_node(host), "node {} pinned to missing host", node.id);
        }
        if let Some(group) = &node.group_id {
            assert!(graph.group(group).is_some(), "node {} in missing group", node.id);
        }
    }
}

#[test]
fn connect_then_delete_source_keeps_target() {
    let mut editor = manual_editor();
    editor.load(board(vec![
        Node::new("a", 0.0, 0.0, 120.0, 50.0),
        Node::new("b", 400.0, 0.0, 120.0, 50.0),
    ]));
    let target = editor.pointer_down(PointerInput::primary(120.0, 25.0)).unwrap();
    assert_eq!(
        target,
        HitTarget::Anchor {
            node_id: "a".into(),
            anchor: Anchor::Right
        }
    );
    assert!(editor.pointer_up(Point::new(398.0, 27.0)).unwrap());
    assert_eq!(editor.graph().edges().len(), 1);

    editor.select_nodes(["a"]);
    assert_eq!(editor.delete_selection(), 1);
    assert!(editor.graph().edges().is_empty());
    let b = editor.graph().node("b").unwrap();
    assert_eq!(b.position(), Point::new(400.0, 0.0));
    assert_integrity(editor.graph());
}

#[test]
fn snap_boundary_is_inclusive() {
    let radius = Config::default().canvas.snap_radius;
    for (offset, connects) in [(radius, true), (radius + 1.0, false)] {
        let mut editor = manual_editor();
        editor.load(board(vec![
            Node::new("a", 0.0, 0.0, 120.0, 50.0),
            Node::new("b", 400.0, 0.0, 120.0, 50.0),
        ]));
        editor.pointer_down(PointerInput::primary(120.0, 25.0)).unwrap();
        // b's left anchor sits at (400, 25)
        let released = editor.pointer_up(Point::new(400.0 - offset, 25.0)).unwrap();
        assert_eq!(released, connects, "offset {offset}");
        assert_eq!(editor.graph().edges().len(), usize::from(connects));
    }
}

#[test]
fn releasing_onto_an_existing_link_changes_nothing() {
    let mut editor = manual_editor();
    editor.load(board(vec![
        Node::new("a", 0.0, 0.0, 120.0, 50.0),
        Node::new("b", 400.0, 0.0, 120.0, 50.0),
        Node::new("c", 400.0, 200.0, 120.0, 50.0),
    ]));
    editor.connect("a", Anchor::Right, "b", Anchor::Left).unwrap();
    let to_c = editor.connect("a", Anchor::Right, "c", Anchor::Left).unwrap();
    let before = editor.graph().to_content();
    let revision = editor.revision();

    editor.pointer_down(PointerInput::primary(120.0, 25.0)).unwrap();
    assert_eq!(editor.pointer_up(Point::new(400.0, 25.0)), Ok(false));
    assert_eq!(editor.gesture(), GestureKind::Idle);

    // dragging the a -> c head onto b would duplicate a -> b
    editor.select_edge(&to_c).unwrap();
    editor.pointer_down(PointerInput::primary(400.0, 225.0)).unwrap();
    assert_eq!(editor.gesture(), GestureKind::Rebinding);
    assert_eq!(editor.pointer_up(Point::new(400.0, 25.0)), Ok(false));
    assert_eq!(editor.gesture(), GestureKind::Idle);

    assert_eq!(editor.graph().to_content(), before);
    assert_eq!(editor.revision(), revision);
}

#[test]
fn undo_and_redo_walk_every_state() {
    let mut editor = manual_editor();
    editor.load(board(Vec::new()));
    let mut states: Vec<ProjectContent> = vec![editor.graph().to_content()];

    let first = editor.add_node(Some(Point::new(0.0, 0.0)), None).unwrap();
    states.push(editor.graph().to_content());
    let second = editor.add_node(Some(Point::new(300.0, 0.0)), None).unwrap();
    states.push(editor.graph().to_content());
    editor.connect(&first, Anchor::Right, &second, Anchor::Left).unwrap();
    states.push(editor.graph().to_content());
    editor.rename_node(&second, "Renamed").unwrap();
    states.push(editor.graph().to_content());
    editor.select_nodes([first.clone()]);
    editor.delete_selection();
    states.push(editor.graph().to_content());

    for expected in states.iter().rev().skip(1) {
        assert!(editor.undo());
        assert_eq!(&editor.graph().to_content(), expected);
    }
    assert!(!editor.undo());
    for expected in states.iter().skip(1) {
        assert!(editor.redo());
        assert_eq!(&editor.graph().to_content(), expected);
    }
    assert!(!editor.redo());
}

#[test]
fn tree_layout_gives_bigger_subtree_more_room() {
    let mut editor = Editor::default();
    editor.load(fixture("hierarchy.json"));
    let graph = editor.graph();
    let at = |id: &str| graph.node(id).unwrap().position();

    assert!(at("root").x < at("a").x);
    assert_eq!(at("a").x, at("b").x);
    assert_eq!(at("b1").x, at("b2").x);
    assert!(at("b").x < at("b1").x);

    // a stays clear of b's children and b is centered on them
    assert!(at("a").y + 50.0 <= at("b1").y);
    assert!((at("b").y - (at("b1").y + at("b2").y) / 2.0).abs() < 0.01);
    // root is centered on the whole block its subtree occupies
    assert!((at("root").y - (at("a").y + at("b2").y) / 2.0).abs() < 0.01);
}

#[test]
fn drilling_down_shows_the_focus_and_its_children() {
    let mut editor = Editor::default();
    editor.load(fixture("hierarchy.json"));
    assert!(editor.drill_down("b"));
    let visible: Vec<String> = editor.visible().nodes.iter().map(|n| n.id.clone()).collect();
    assert_eq!(visible, ["b", "b1", "b2"]);
    assert_eq!(editor.breadcrumb()[0].name, "Billing");

    let svg = render_editor_svg(&editor);
    assert!(svg.contains("invoice.rs"));
    assert!(!svg.contains("Auth"));

    editor.go_back();
    assert_eq!(editor.focus(), None);
}

#[test]
fn every_layout_places_the_visible_layer() {
    for algorithm in LayoutAlgorithm::ALL {
        let mut editor = Editor::default();
        editor.load(fixture("hierarchy.json"));
        let result = editor.apply_layout(algorithm);
        assert_eq!(result.positions.len(), 5, "{}", algorithm.as_str());
        assert!(
            editor
                .graph()
                .nodes()
                .iter()
                .all(|n| n.x.is_finite() && n.y.is_finite())
        );
    }
}

#[test]
fn align_and_distribute_selection() {
    let mut editor = manual_editor();
    editor.load(board(vec![
        Node::new("a", 0.0, 10.0, 100.0, 40.0),
        Node::new("b", 130.0, 80.0, 60.0, 40.0),
        Node::new("c", 500.0, 30.0, 100.0, 40.0),
    ]));
    editor.select_all();
    editor.align_selection(Alignment::Top).unwrap();
    assert!(editor.graph().nodes().iter().all(|n| n.y == 10.0));

    editor.distribute_selection(Axis::Horizontal).unwrap();
    let x = |id: &str| editor.graph().node(id).unwrap().x;
    assert_eq!(x("a"), 0.0);
    assert_eq!(x("c"), 500.0);
    // span 600, occupied 260, two gaps of 170
    assert_eq!(x("b"), 270.0);

    editor.select_nodes(["a"]);
    assert!(editor.align_selection(Alignment::Left).is_err());
}

#[test]
fn dashboard_quirks_are_repaired_on_load() {
    let mut editor = manual_editor();
    let report = editor.load(fixture("dashboard_quirks.json")).clone();
    assert_eq!(
        report,
        SanitizeReport {
            dropped_nodes: 1,
            dropped_edges: 2,
            repositioned: 1,
            resized: 1,
            cleared_parents: 1,
            cleared_attachments: 0,
            cleared_colors: 1,
            recreated_groups: 1,
        }
    );
    let graph = editor.graph();
    assert_eq!(graph.nodes().len(), 4);
    assert_eq!(graph.edges().len(), 1);
    assert_eq!(graph.node("n1").unwrap().layer_type, Some(LayerType::Feature));
    assert_eq!(graph.node("n1").unwrap().name, "Kept");
    assert_integrity(graph);
}

#[derive(Debug, Clone)]
enum Op {
    Add,
    Connect(usize, usize),
    DeleteNode(usize),
    DeleteEdge(usize),
    Reparent(usize, usize),
    CopyPaste(usize),
    Group(usize, usize),
    Attach(usize, usize),
    Undo,
    Redo,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Add),
        3 => (0..8usize, 0..8usize).prop_map(|(a, b)| Op::Connect(a, b)),
        1 => (0..8usize).prop_map(Op::DeleteNode),
        1 => (0..8usize).prop_map(Op::DeleteEdge),
        1 => (0..8usize, 0..8usize).prop_map(|(a, b)| Op::Reparent(a, b)),
        1 => (0..8usize).prop_map(Op::CopyPaste),
        1 => (0..8usize, 0..8usize).prop_map(|(a, b)| Op::Group(a, b)),
        1 => (0..8usize, 0..8usize).prop_map(|(a, b)| Op::Attach(a, b)),
        1 => Just(Op::Undo),
        1 => Just(Op::Redo),
    ]
}

fn node_id(editor: &Editor, index: usize) -> Option<String> {
    let nodes = editor.graph().nodes();
    (!nodes.is_empty()).then(|| nodes[index % nodes.len()].id.clone())
}

proptest! {
    #[test]
    fn edits_never_leave_dangling_references(ops in proptest::collection::vec(op(), 1..60)) {
        let mut editor = manual_editor();
        editor.load(board(Vec::new()));
        for op in ops {
            match op {
                Op::Add => {
                    let _ = editor.add_node(None, None);
                }
                Op::Connect(a, b) => {
                    if let (Some(a), Some(b)) = (node_id(&editor, a), node_id(&editor, b)) {
                        let _ = editor.connect(&a, Anchor::Right, &b, Anchor::Left);
                    }
                }
                Op::DeleteNode(a) => {
                    if let Some(a) = node_id(&editor, a) {
                        let _ = editor.delete_node(&a);
                    }
                }
                Op::DeleteEdge(i) => {
                    let edges = editor.graph().edges();
                    if !edges.is_empty() {
                        let id = edges[i % edges.len()].id.clone();
                        let _ = editor.delete_edge(&id);
                    }
                }
                Op::Reparent(a, b) => {
                    if let (Some(a), Some(b)) = (node_id(&editor, a), node_id(&editor, b)) {
                        let _ = editor.set_parent(&a, Some(&b));
                    }
                }
                Op::CopyPaste(a) => {
                    if let Some(a) = node_id(&editor, a) {
                        editor.select_nodes([a]);
                        editor.copy();
                        let _ = editor.paste();
                    }
                }
                Op::Group(a, b) => {
                    if let (Some(a), Some(b)) = (node_id(&editor, a), node_id(&editor, b)) {
                        editor.select_nodes([a, b]);
                        let _ = editor.group_selection();
                    }
                }
                Op::Attach(a, b) => {
                    if let (Some(a), Some(b)) = (node_id(&editor, a), node_id(&editor, b)) {
                        let _ = editor.attach_annotation(&a, &b, Default::default());
                    }
                }
                Op::Undo => {
                    editor.undo();
                }
                Op::Redo => {
                    editor.redo();
                }
            }
            assert_integrity(editor.graph());
        }
    }
}
