//! Wire-level records shared by the editor, the project gateway and exports.
//!
//! Field names are camelCase and enum values kebab-case so that projects saved
//! by the browser dashboard load unchanged.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::geometry::{Point, Rect};

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap());

pub fn is_valid_color(value: &str) -> bool {
    COLOR_RE.is_match(value)
}

/// `node-3f2a...`, `edge-...`, `group-...`
pub fn fresh_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeShape {
    #[default]
    Rounded,
    Rect,
    Pill,
    Diamond,
}

impl NodeShape {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "rounded" | "rounded-rect" => Some(Self::Rounded),
            "rect" => Some(Self::Rect),
            "pill" => Some(Self::Pill),
            "diamond" => Some(Self::Diamond),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    Top,
    Right,
    Bottom,
    Left,
}

impl Anchor {
    pub const ALL: [Anchor; 4] = [Anchor::Top, Anchor::Right, Anchor::Bottom, Anchor::Left];

    /// Unit vector pointing out of the node through this anchor.
    pub fn normal(self) -> (f32, f32) {
        match self {
            Anchor::Top => (0.0, -1.0),
            Anchor::Right => (1.0, 0.0),
            Anchor::Bottom => (0.0, 1.0),
            Anchor::Left => (-1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineType {
    None,
    #[default]
    ArrowEnd,
    ArrowStart,
    ArrowBoth,
}

impl LineType {
    pub fn arrow_start(self) -> bool {
        matches!(self, LineType::ArrowStart | LineType::ArrowBoth)
    }

    pub fn arrow_end(self) -> bool {
        matches!(self, LineType::ArrowEnd | LineType::ArrowBoth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
}

/// Display tag only; `module` and `logic` are legacy spellings of `feature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    #[serde(alias = "module", alias = "logic")]
    Feature,
    Code,
    Annotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachPosition {
    TopRight,
    BottomRight,
    BottomLeft,
    #[default]
    TopLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeEnd {
    From,
    To,
}

impl EdgeEnd {
    pub fn opposite(self) -> Self {
        match self {
            EdgeEnd::From => EdgeEnd::To,
            EdgeEnd::To => EdgeEnd::From,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default = "unset", deserialize_with = "lenient_f32")]
    pub x: f32,
    #[serde(default = "unset", deserialize_with = "lenient_f32")]
    pub y: f32,
    #[serde(default = "unset", deserialize_with = "lenient_f32")]
    pub width: f32,
    #[serde(default = "unset", deserialize_with = "lenient_f32")]
    pub height: f32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shape: NodeShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<LayerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_position: Option<AttachPosition>,
}

fn unset() -> f32 {
    f32::NAN
}

// Dashboard payloads sometimes carry `null` geometry; those become NaN here and
// are replaced with defaults when the graph is sanitized.
fn lenient_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
}

impl Node {
    pub fn new(id: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width,
            height,
            name: String::new(),
            shape: NodeShape::default(),
            color: None,
            group_id: None,
            description: None,
            parent_id: None,
            layer_type: None,
            file_path: None,
            attached_to: None,
            attach_position: None,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Point {
        self.rect().center()
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_annotation(&self) -> bool {
        self.layer_type == Some(LayerType::Annotation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub from_anchor: Anchor,
    pub to: String,
    pub to_anchor: Anchor,
    #[serde(default)]
    pub line_type: LineType,
    #[serde(default)]
    pub line_style: LineStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Edge {
    pub fn endpoint(&self, end: EdgeEnd) -> (&str, Anchor) {
        match end {
            EdgeEnd::From => (&self.from, self.from_anchor),
            EdgeEnd::To => (&self.to, self.to_anchor),
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }

    pub fn same_connection(&self, from: &str, from_anchor: Anchor, to: &str, to_anchor: Anchor) -> bool {
        self.from == from && self.from_anchor == from_anchor && self.to == to && self.to_anchor == to_anchor
    }
}

/// Visual appearance applied to new edges and to `set_edge_style` patches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeStyle {
    pub line_type: LineType,
    pub line_style: LineStyle,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeStylePatch {
    pub line_type: Option<LineType>,
    pub line_style: Option<LineStyle>,
    pub color: Option<String>,
}

/// Label only. Membership is the set of nodes whose `group_id` matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "lenient_edges")]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

// A single malformed edge (unknown anchor, missing endpoint field) must not
// reject the whole project.
fn lenient_edges<'de, D>(deserializer: D) -> Result<Vec<Edge>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();
    let edges: Vec<Edge> = raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if edges.len() != total {
        tracing::warn!(dropped = total - edges.len(), "dropped unparseable edge records");
    }
    Ok(edges)
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: fresh_id("project"),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            groups: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Parses a full project record, or bare `{nodes, edges, groups}` content
    /// wrapped in a fresh project called `fallback_name`.
    pub fn from_json(input: &str, fallback_name: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        if value.get("id").is_some() && value.get("name").is_some() {
            return serde_json::from_value(value);
        }
        let content: ProjectContent = serde_json::from_value(value)?;
        let mut project = Self::new(fallback_name);
        project.nodes = content.nodes;
        project.edges = content.edges;
        project.groups = content.groups;
        Ok(project)
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            node_count: self.nodes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub node_count: usize,
}

/// Body of a save: the full graph, replacing whatever the store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContent {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "lenient_edges")]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
}

/// Standalone JSON export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExport<'a> {
    pub title: &'a str,
    pub nodes: &'a [Node],
    pub edges: &'a [Edge],
    pub exported_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dashboard_payload() {
        let raw = r##"{
            "id": "p1",
            "name": "Board",
            "nodes": [
                {"id": "a", "x": 10, "y": 20, "width": 120, "height": 50, "name": "A", "shape": "pill", "layerType": "module"},
                {"id": "b", "x": null, "name": "B"}
            ],
            "edges": [
                {"id": "e1", "from": "a", "fromAnchor": "right", "to": "b", "toAnchor": "left", "lineType": "arrow-both", "lineStyle": "dashed"},
                {"id": "e2", "from": "a", "fromAnchor": "middle", "to": "b", "toAnchor": "left"}
            ]
        }"##;
        let project: Project = serde_json::from_str(raw).unwrap();
        assert_eq!(project.nodes.len(), 2);
        assert_eq!(project.nodes[0].shape, NodeShape::Pill);
        assert_eq!(project.nodes[0].layer_type, Some(LayerType::Feature));
        assert!(project.nodes[1].x.is_nan());
        assert!(project.nodes[1].width.is_nan());
        assert_eq!(project.edges.len(), 1);
        assert_eq!(project.edges[0].line_type, LineType::ArrowBoth);
        assert_eq!(project.edges[0].line_style, LineStyle::Dashed);
    }

    #[test]
    fn edge_defaults_match_dashboard() {
        let edge: Edge = serde_json::from_str(
            r#"{"id":"e","from":"a","fromAnchor":"top","to":"b","toAnchor":"bottom"}"#,
        )
        .unwrap();
        assert_eq!(edge.line_type, LineType::ArrowEnd);
        assert_eq!(edge.line_style, LineStyle::Solid);
        assert!(edge.color.is_none());
    }

    #[test]
    fn serializes_camel_case_and_skips_empty_options() {
        let mut node = Node::new("n", 1.0, 2.0, 3.0, 4.0);
        node.parent_id = Some("p".to_string());
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["parentId"], "p");
        assert!(json.get("groupId").is_none());
        assert_eq!(json["shape"], "rounded");
    }

    #[test]
    fn validates_colors() {
        assert!(is_valid_color("#3b82f6"));
        assert!(is_valid_color("#fff"));
        assert!(is_valid_color("#3b82f620"));
        assert!(!is_valid_color("blue"));
        assert!(!is_valid_color("#12345"));
    }

    #[test]
    fn fresh_ids_are_prefixed_and_unique() {
        let a = fresh_id("node");
        let b = fresh_id("node");
        assert!(a.starts_with("node-"));
        assert_ne!(a, b);
    }

    #[test]
    fn from_json_accepts_records_and_bare_content() {
        let record = r#"{"id":"p1","name":"Board","nodes":[{"id":"a","x":0,"y":0,"width":100,"height":50}]}"#;
        let project = Project::from_json(record, "unused").unwrap();
        assert_eq!((project.id.as_str(), project.nodes.len()), ("p1", 1));

        let bare = Project::from_json(r#"{"nodes":[],"edges":[]}"#, "sketch").unwrap();
        assert_eq!(bare.name, "sketch");
        assert!(bare.id.starts_with("project-"));

        assert!(Project::from_json("flowchart LR", "x").is_err());
    }

    #[test]
    fn bare_content_drops_malformed_edges() {
        let bare = r#"{
            "nodes": [
                {"id": "a", "x": 0, "y": 0, "width": 100, "height": 50},
                {"id": "b", "x": 200, "y": 0, "width": 100, "height": 50}
            ],
            "edges": [
                {"id": "e1", "from": "a", "fromAnchor": "right", "to": "b", "toAnchor": "left"},
                {"id": "e2", "from": "a", "fromAnchor": "middle", "to": "b", "toAnchor": "left"}
            ]
        }"#;
        let project = Project::from_json(bare, "sketch").unwrap();
        assert_eq!(project.nodes.len(), 2);
        assert_eq!(project.edges.len(), 1);
        assert_eq!(project.edges[0].id, "e1");

        let nodes_only = Project::from_json(r#"{"nodes": []}"#, "sketch").unwrap();
        assert!(nodes_only.edges.is_empty());
    }
}
