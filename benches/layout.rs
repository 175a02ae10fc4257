use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use panorama_canvas::config::LayoutConfig;
use panorama_canvas::connection::CubicPath;
use panorama_canvas::editor::Editor;
use panorama_canvas::geometry::Point;
use panorama_canvas::graph::GraphModel;
use panorama_canvas::layout::{ExpandedSet, LayoutAlgorithm, LayoutInput, TreeDirection, compute_layout};
use panorama_canvas::model::{Anchor, Edge, LineStyle, LineType, Node, Project, ProjectContent};
use panorama_canvas::render::render_editor_svg;
use panorama_canvas::theme::Theme;
use std::hint::black_box;

/// A balanced tree with `fanout` children per node, `depth` levels deep, plus
/// one cross edge per leaf pair.
fn tree_project(fanout: usize, depth: usize) -> Project {
    let mut project = Project::new("bench");
    let mut frontier = vec!["n0".to_string()];
    project.nodes.push(Node::new("n0", 0.0, 0.0, 120.0, 50.0));
    let mut next_id = 1;
    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in &frontier {
            for _ in 0..fanout {
                let id = format!("n{next_id}");
                next_id += 1;
                let mut node = Node::new(id.clone(), 0.0, 0.0, 120.0, 50.0);
                node.parent_id = Some(parent.clone());
                project.nodes.push(node);
                project.edges.push(edge(parent, &id));
                next.push(id);
            }
        }
        frontier = next;
    }
    for pair in frontier.chunks(2) {
        if let [a, b] = pair {
            project.edges.push(edge(a, b));
        }
    }
    project
}

fn edge(from: &str, to: &str) -> Edge {
    Edge {
        id: format!("{from}-{to}"),
        from: from.to_string(),
        from_anchor: Anchor::Right,
        to: to.to_string(),
        to_anchor: Anchor::Left,
        line_type: LineType::default(),
        line_style: LineStyle::default(),
        color: None,
    }
}

fn sizes() -> [(&'static str, usize, usize); 3] {
    [("tree_small", 3, 2), ("tree_medium", 4, 3), ("tree_large", 5, 4)]
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for (name, fanout, depth) in sizes() {
        let project = tree_project(fanout, depth);
        let content = ProjectContent {
            nodes: project.nodes,
            edges: project.edges,
            groups: Vec::new(),
        };
        let (graph, _) = GraphModel::from_parts(content, &Theme::default());
        let mut expanded = ExpandedSet::default();
        expanded.expand_all(&graph);
        for algorithm in LayoutAlgorithm::ALL {
            group.bench_with_input(
                BenchmarkId::new(algorithm.as_str(), name),
                &graph,
                |b, graph| {
                    let visible = graph.visible_set(None, &expanded);
                    let input = LayoutInput::from_visible(&visible, None, &expanded, TreeDirection::Horizontal);
                    b.iter(|| {
                        let result = compute_layout(algorithm, black_box(&input), &config);
                        black_box(result.positions.len());
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_hit_test(c: &mut Criterion) {
    let mut group = c.benchmark_group("hit_test");
    for (name, fanout, depth) in sizes() {
        let mut editor = Editor::default();
        editor.load(tree_project(fanout, depth));
        let probe = editor
            .graph()
            .bounds()
            .map(|b| b.center())
            .unwrap_or(Point::ZERO);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(editor.hit_test(black_box(probe))));
        });
    }
    group.finish();
}

fn bench_edge_distance(c: &mut Criterion) {
    let from = Node::new("a", 0.0, 0.0, 120.0, 50.0);
    let to = Node::new("b", 600.0, 300.0, 120.0, 50.0);
    let path = CubicPath::for_edge(&edge("a", "b"), &from, &to);
    c.bench_function("edge_distance", |b| {
        b.iter(|| black_box(path.distance_to(black_box(Point::new(300.0, 160.0)))));
    });
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for (name, fanout, depth) in sizes() {
        let mut editor = Editor::default();
        editor.load(tree_project(fanout, depth));
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(render_editor_svg(&editor).len()));
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_hit_test, bench_edge_distance, bench_render
);
criterion_main!(benches);
