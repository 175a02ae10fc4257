use crate::config::RenderConfig;
use crate::connection::CubicPath;
use crate::editor::Editor;
use crate::geometry::{Point, Rect, bounds_of};
use crate::graph::GraphModel;
use crate::model::{Edge, LineStyle, Node, NodeShape};
use crate::selection::{Guide, GuideAxis};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::Path;

const ARROW_SIZE: f32 = 10.0;
const GROUP_PADDING: f32 = 12.0;

/// What to draw: nodes as currently shown plus the overlays of the active
/// gesture.
#[derive(Debug, Clone, Default)]
pub struct Scene<'a> {
    pub nodes: Vec<Node>,
    pub edges: Vec<&'a Edge>,
    pub selected: BTreeSet<String>,
    pub selected_edge: Option<&'a str>,
    pub guides: &'a [Guide],
    pub selection_box: Option<Rect>,
    pub connection_preview: Option<(Point, Point)>,
}

impl<'a> Scene<'a> {
    pub fn from_editor(editor: &'a Editor) -> Self {
        Self {
            nodes: editor.display_nodes(),
            edges: editor.visible().edges,
            selected: editor.selected_ids().clone(),
            selected_edge: editor.selection().edge(),
            guides: editor.guides(),
            selection_box: editor.selection_box(),
            connection_preview: editor.connection_preview(),
        }
    }

    /// Every node and edge, no overlays.
    pub fn from_graph(graph: &'a GraphModel) -> Self {
        Self {
            nodes: graph.nodes().to_vec(),
            edges: graph.edges().iter().collect(),
            ..Self::default()
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        bounds_of(self.nodes.iter().map(Node::rect))
    }
}

/// Draws the scene into a standalone SVG sized to its content plus padding.
pub fn render_svg(scene: &Scene<'_>, graph: &GraphModel, theme: &Theme, config: &RenderConfig) -> String {
    let frame = match scene.bounds() {
        Some(bounds) => bounds.inflate(config.padding),
        None => Rect::new(0.0, 0.0, config.width, config.height),
    };
    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.2}\" height=\"{h:.2}\" viewBox=\"{x:.2} {y:.2} {w:.2} {h:.2}\">",
        x = frame.x,
        y = frame.y,
        w = frame.width,
        h = frame.height,
    );
    let _ = write!(
        svg,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
        frame.x, frame.y, frame.width, frame.height, config.background
    );

    render_groups(&mut svg, scene, graph, theme);

    let by_id: HashMap<&str, &Node> = scene.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    for edge in &scene.edges {
        let (Some(from), Some(to)) = (by_id.get(edge.from.as_str()), by_id.get(edge.to.as_str())) else {
            continue;
        };
        let selected = scene.selected_edge == Some(edge.id.as_str());
        render_edge(&mut svg, edge, from, to, selected, theme);
    }

    for node in &scene.nodes {
        let color = graph
            .node(&node.id)
            .map_or(node.color.as_deref().unwrap_or(&theme.node_color), |n| {
                graph.display_color(n, theme)
            });
        render_node(&mut svg, node, color, scene.selected.contains(&node.id), theme);
    }

    for guide in scene.guides {
        let (x1, y1, x2, y2) = match guide.axis {
            GuideAxis::Vertical => (guide.position, frame.y, guide.position, frame.bottom()),
            GuideAxis::Horizontal => (frame.x, guide.position, frame.right(), guide.position),
        };
        let _ = write!(
            svg,
            "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" stroke=\"{}\" stroke-width=\"1\" stroke-dasharray=\"4 4\"/>",
            theme.guide_color
        );
    }

    if let Some(rect) = scene.selection_box {
        let _ = write!(
            svg,
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" fill-opacity=\"0.1\" stroke=\"{}\" stroke-dasharray=\"4 2\"/>",
            rect.x, rect.y, rect.width, rect.height, theme.hover_color, theme.hover_color
        );
    }

    if let Some((start, end)) = scene.connection_preview {
        let _ = write!(
            svg,
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"2\" stroke-dasharray=\"6 4\"/>",
            start.x, start.y, end.x, end.y, theme.anchor_active_color
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Renders what the editor currently shows, overlays included.
pub fn render_editor_svg(editor: &Editor) -> String {
    let config = editor.config();
    render_svg(&Scene::from_editor(editor), editor.graph(), &config.theme, &config.render)
}

fn render_groups(svg: &mut String, scene: &Scene<'_>, graph: &GraphModel, theme: &Theme) {
    for group in graph.groups() {
        let members = scene
            .nodes
            .iter()
            .filter(|n| n.group_id.as_deref() == Some(group.id.as_str()))
            .map(Node::rect);
        let Some(bounds) = bounds_of(members) else {
            continue;
        };
        let rect = bounds.inflate(GROUP_PADDING);
        let _ = write!(
            svg,
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"10\" ry=\"10\" fill=\"{c}\" fill-opacity=\"0.08\" stroke=\"{c}\" stroke-dasharray=\"6 4\" stroke-width=\"1.2\"/>",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            c = group.color
        );
        let _ = write!(
            svg,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            rect.x + 8.0,
            rect.y - 6.0,
            theme.font_family,
            theme.font_size - 2.0,
            group.color,
            escape_xml(&group.name)
        );
    }
}

fn render_edge(svg: &mut String, edge: &Edge, from: &Node, to: &Node, selected: bool, theme: &Theme) {
    let path = CubicPath::for_edge(edge, from, to);
    let color = if selected {
        theme.selected_edge_color.as_str()
    } else {
        edge.color.as_deref().unwrap_or(&theme.edge_color)
    };
    let dash = match edge.line_style {
        LineStyle::Dashed => " stroke-dasharray=\"6 4\"",
        LineStyle::Solid => "",
    };
    let width = if selected { 2.5 } else { 1.6 };
    let _ = write!(
        svg,
        "<path d=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"{width}\"{dash}/>",
        path.to_svg_path()
    );
    for [tip, left, right] in path.arrowheads(edge.line_type, ARROW_SIZE) {
        let _ = write!(
            svg,
            "<path d=\"M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} Z\" fill=\"{color}\"/>",
            tip.x, tip.y, left.x, left.y, right.x, right.y
        );
    }
}

fn render_node(svg: &mut String, node: &Node, color: &str, selected: bool, theme: &Theme) {
    let stroke = if selected { theme.selection_color.as_str() } else { color };
    let stroke_width = if selected { 3.0 } else { 1.4 };
    let dash = if node.is_annotation() { " stroke-dasharray=\"4 3\"" } else { "" };
    let (x, y, w, h) = (node.x, node.y, node.width, node.height);
    match node.shape {
        NodeShape::Diamond => {
            let c = node.center();
            let _ = write!(
                svg,
                "<polygon points=\"{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}\" fill=\"{color}\" stroke=\"{stroke}\" stroke-width=\"{stroke_width}\"{dash}/>",
                c.x,
                y,
                x + w,
                c.y,
                c.x,
                y + h,
                x,
                c.y
            );
        }
        shape => {
            let radius = match shape {
                NodeShape::Rect => 0.0,
                NodeShape::Pill => h / 2.0,
                _ => 8.0,
            };
            let _ = write!(
                svg,
                "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"{radius:.2}\" ry=\"{radius:.2}\" fill=\"{color}\" stroke=\"{stroke}\" stroke-width=\"{stroke_width}\"{dash}/>"
            );
        }
    }
    let center = node.center();
    let _ = write!(
        svg,
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        center.x,
        center.y,
        theme.font_family,
        theme.font_size,
        theme.text_color,
        escape_xml(&node.name)
    );
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("invalid render size {}x{}", render_cfg.width, render_cfg.height))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
