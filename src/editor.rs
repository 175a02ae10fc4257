//! The editor aggregate: one graph, one view, one selection, one history, and
//! the pointer/keyboard state machine that drives them.
//!
//! Gestures only touch preview state while the pointer is down. The model is
//! mutated once, on pointer-up, and that mutation is what lands in history.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::{AnchorTarget, CubicPath, EndpointRebind, PendingConnection, anchor_point, nearest_anchor};
use crate::error::{EditorError, EditorResult};
use crate::gateway::{SaveOutcome, SaveRequest};
use crate::geometry::{Point, Rect};
use crate::graph::{GraphModel, NodeDraft, SanitizeReport, VisibleSet};
use crate::history::{Clipboard, History};
use crate::input::{Key, KeyInput, PointerButton, PointerInput, WheelInput};
use crate::layout::{ExpandedSet, LayoutAlgorithm, LayoutInput, LayoutResult, TreeDirection, compute_layout};
use crate::minimap::{MiniMapDrag, MiniMapFrame, MiniMapProjector};
use crate::model::{
    Anchor, AttachPosition, EdgeEnd, EdgeStyle, EdgeStylePatch, Group, LayerType, LineStyle, LineType,
    Node, NodeShape, Project, ProjectContent, ProjectExport,
};
use crate::selection::{Alignment, Axis, BoxSelect, DragState, Guide, ResizeState, Selection, align, distribute};
use crate::view::ViewTransform;

/// Defaults applied to newly created nodes and edges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolState {
    pub shape: NodeShape,
    pub node_color: Option<String>,
    pub line_type: LineType,
    pub line_style: LineStyle,
    pub edge_color: Option<String>,
}

impl ToolState {
    pub fn edge_style(&self) -> EdgeStyle {
        EdgeStyle {
            line_type: self.line_type,
            line_style: self.line_style,
            color: self.edge_color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "kebab-case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed(String),
}

/// What sits under the pointer, in hit-test priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    EdgeHandle { edge_id: String, end: EdgeEnd },
    Anchor { node_id: String, anchor: Anchor },
    ResizeHandle { node_id: String },
    Node { node_id: String },
    Edge { edge_id: String },
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureKind {
    Idle,
    Dragging,
    BoxSelecting,
    Resizing,
    Connecting,
    Rebinding,
    Panning,
    MiniMap,
}

#[derive(Debug, Clone)]
enum Gesture {
    Idle,
    Dragging(DragState),
    BoxSelecting(BoxSelect),
    Resizing(ResizeState),
    Connecting(PendingConnection),
    Rebinding(EndpointRebind),
    Panning,
    MiniMap(MiniMapDrag),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreadcrumbEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
struct OpenProject {
    id: String,
    name: String,
    created_at: chrono::DateTime<Utc>,
}

fn focus_of(path: &[String]) -> Option<&str> {
    path.last().map(String::as_str)
}

/// A link gesture released onto a duplicate or a self loop ends without a
/// change. Anything else is a real failure.
fn ignore_refused_link(err: EditorError) -> EditorResult<bool> {
    match err {
        EditorError::DuplicateEdge { .. } | EditorError::SelfLoop(_) => {
            debug!(%err, "link gesture dropped");
            Ok(false)
        }
        other => Err(other),
    }
}

#[derive(Debug, Clone)]
pub struct Editor {
    config: Config,
    graph: GraphModel,
    view: ViewTransform,
    selection: Selection,
    history: History,
    clipboard: Clipboard,
    expanded: ExpandedSet,
    view_path: Vec<String>,
    direction: TreeDirection,
    tool: ToolState,
    gesture: Gesture,
    project: Option<OpenProject>,
    revision: u64,
    saved_revision: u64,
    save_status: SaveStatus,
    last_report: SanitizeReport,
}

impl Editor {
    pub fn new(config: Config) -> Self {
        let mut history = History::new(config.history.capacity);
        history.reset(GraphModel::new().to_content());
        Self {
            view: ViewTransform::new(&config.view),
            direction: config.layout.direction,
            graph: GraphModel::new(),
            selection: Selection::default(),
            history,
            clipboard: Clipboard::default(),
            expanded: ExpandedSet::default(),
            view_path: Vec::new(),
            tool: ToolState::default(),
            gesture: Gesture::Idle,
            project: None,
            revision: 0,
            saved_revision: 0,
            save_status: SaveStatus::Idle,
            last_report: SanitizeReport::default(),
            config,
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn expanded(&self) -> &ExpandedSet {
        &self.expanded
    }

    pub fn tool(&self) -> &ToolState {
        &self.tool
    }

    pub fn tool_mut(&mut self) -> &mut ToolState {
        &mut self.tool
    }

    pub fn direction(&self) -> TreeDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: TreeDirection) {
        self.direction = direction;
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Unsaved changes since the last successful save.
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn save_status(&self) -> &SaveStatus {
        &self.save_status
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.id.as_str())
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.name.as_str())
    }

    pub fn last_sanitize_report(&self) -> &SanitizeReport {
        &self.last_report
    }

    pub fn focus(&self) -> Option<&str> {
        focus_of(&self.view_path)
    }

    pub fn view_path(&self) -> &[String] {
        &self.view_path
    }

    pub fn visible(&self) -> VisibleSet<'_> {
        self.graph.visible_set(focus_of(&self.view_path), &self.expanded)
    }

    // ---- project lifecycle ----

    /// Replaces everything with `project`. Navigation, expansion, selection
    /// and history start over; the loaded state is the undo baseline.
    pub fn load(&mut self, project: Project) -> &SanitizeReport {
        let content = ProjectContent {
            nodes: project.nodes,
            edges: project.edges,
            groups: project.groups,
        };
        let (graph, report) = GraphModel::from_parts(content, &self.config.theme);
        self.graph = graph;
        self.gesture = Gesture::Idle;
        self.view_path.clear();
        self.selection.clear();
        self.expanded.collapse_all();
        self.expanded.expand_all(&self.graph);
        self.view.reset();
        if self.config.canvas.auto_layout_on_load && !self.graph.is_empty() {
            let result = self.compute(LayoutAlgorithm::Tree);
            self.place(&result);
        }
        self.history.reset(self.graph.to_content());
        self.project = Some(OpenProject {
            id: project.id,
            name: project.name,
            created_at: project.created_at,
        });
        self.revision = 0;
        self.saved_revision = 0;
        self.save_status = SaveStatus::Idle;
        self.last_report = report;
        info!(
            project = self.project_id().unwrap_or_default(),
            nodes = self.graph.nodes().len(),
            edges = self.graph.edges().len(),
            "loaded project"
        );
        &self.last_report
    }

    /// The current graph as a project record, if one is open.
    pub fn to_project(&self) -> Option<Project> {
        let open = self.project.as_ref()?;
        let content = self.graph.to_content();
        Some(Project {
            id: open.id.clone(),
            name: open.name.clone(),
            nodes: content.nodes,
            edges: content.edges,
            groups: content.groups,
            created_at: open.created_at,
            updated_at: Utc::now(),
        })
    }

    pub fn begin_save(&mut self) -> EditorResult<SaveRequest> {
        let id = self.project_id().ok_or(EditorError::NoProject)?.to_string();
        self.save_status = SaveStatus::Saving;
        debug!(project = %id, revision = self.revision, "begin save");
        Ok(SaveRequest {
            project_id: id,
            revision: self.revision,
            content: self.graph.to_content(),
        })
    }

    /// Applies a finished save. Edits made while it was in flight keep the
    /// editor dirty.
    pub fn finish_save(&mut self, outcome: SaveOutcome) {
        if self.project_id() != Some(outcome.project_id.as_str()) {
            debug!(project = %outcome.project_id, "ignoring save for a project that is no longer open");
            return;
        }
        match outcome.result {
            Ok(at) => {
                self.saved_revision = self.saved_revision.max(outcome.revision);
                self.save_status = SaveStatus::Saved;
                info!(revision = outcome.revision, %at, dirty = self.is_dirty(), "saved project");
            }
            Err(message) => {
                self.save_status = SaveStatus::Failed(message);
            }
        }
    }

    pub fn export_json(&self, title: &str) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ProjectExport {
            title,
            nodes: self.graph.nodes(),
            edges: self.graph.edges(),
            exported_at: Utc::now(),
        })
    }

    // ---- history ----

    fn commit(&mut self, what: &str) {
        self.history.record(self.graph.to_content());
        self.revision += 1;
        self.selection.retain_existing(&self.graph);
        debug!(what, revision = self.revision, "commit");
    }

    fn restore(&mut self, snapshot: ProjectContent) {
        self.graph.restore(snapshot);
        self.revision += 1;
        self.gesture = Gesture::Idle;
        self.selection.retain_existing(&self.graph);
        if let Some(missing) = self.view_path.iter().position(|id| !self.graph.contains_node(id)) {
            self.view_path.truncate(missing);
        }
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo().cloned() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo().cloned() {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    // ---- node and edge commands ----

    /// Adds a node with its top-left at `at`, or cascaded from the origin when
    /// no position is given. Inside a drill-down the node joins the focus.
    pub fn add_node(&mut self, at: Option<Point>, shape: Option<NodeShape>) -> EditorResult<String> {
        let count = self.graph.nodes().len() as f32;
        let at = at.unwrap_or_else(|| {
            Point::new(
                100.0 + (count * 50.0) % 400.0,
                100.0 + (count / 4.0).floor() * 80.0,
            )
        });
        let mut draft = NodeDraft::at(at.x, at.y, self.config.canvas.default_node_size());
        draft.shape = shape.unwrap_or(self.tool.shape);
        draft.color = self.tool.node_color.clone();
        draft.parent_id = self.focus().map(str::to_string);
        let node = self.graph.add_node(draft)?;
        self.selection.replace([node.id.clone()]);
        self.commit("add node");
        Ok(node.id)
    }

    /// Drops a shape from the palette, centered on the screen point.
    pub fn drop_shape(&mut self, screen: Point, shape: NodeShape) -> EditorResult<String> {
        let model = self.view.screen_to_model(screen);
        let size = self.config.canvas.default_node_size();
        self.add_node(
            Some(Point::new(model.x - size.width / 2.0, model.y - size.height / 2.0)),
            Some(shape),
        )
    }

    pub fn add_child(&mut self, parent_id: &str) -> EditorResult<String> {
        let (child, _) = self.graph.add_child(parent_id)?;
        self.expanded.expand(parent_id);
        self.selection.replace([child.id.clone()]);
        self.commit("add child");
        Ok(child.id)
    }

    pub fn connect(
        &mut self,
        from: &str,
        from_anchor: Anchor,
        to: &str,
        to_anchor: Anchor,
    ) -> EditorResult<String> {
        let style = self.tool.edge_style();
        let edge = self.graph.add_edge(from, from_anchor, to, to_anchor, &style)?;
        self.commit("connect");
        Ok(edge.id)
    }

    /// Deletes the selected nodes, or the selected edge when no node is
    /// selected. Returns how many items went away.
    pub fn delete_selection(&mut self) -> usize {
        if !self.selection.nodes().is_empty() {
            let ids = self.selection.node_ids();
            let removed = self.graph.delete_nodes(&ids).len();
            self.selection.clear();
            self.commit("delete nodes");
            return removed;
        }
        let Some(edge_id) = self.selection.edge().map(str::to_string) else {
            return 0;
        };
        self.selection.clear();
        match self.graph.delete_edge(&edge_id) {
            Ok(_) => {
                self.commit("delete edge");
                1
            }
            Err(_) => 0,
        }
    }

    pub fn delete_node(&mut self, id: &str) -> EditorResult<()> {
        self.graph.delete_node(id)?;
        self.commit("delete node");
        Ok(())
    }

    pub fn delete_subtree(&mut self, id: &str) -> EditorResult<usize> {
        let removed = self.graph.delete_subtree(id)?.len();
        self.commit("delete subtree");
        Ok(removed)
    }

    pub fn delete_edge(&mut self, id: &str) -> EditorResult<()> {
        self.graph.delete_edge(id)?;
        self.commit("delete edge");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.selection.clear();
        self.view_path.clear();
        self.expanded.collapse_all();
        self.commit("clear");
    }

    pub fn rename_node(&mut self, id: &str, name: &str) -> EditorResult<()> {
        self.graph.rename_node(id, name)?;
        self.commit("rename node");
        Ok(())
    }

    pub fn set_description(&mut self, id: &str, text: Option<String>) -> EditorResult<()> {
        self.graph.set_description(id, text)?;
        self.commit("describe node");
        Ok(())
    }

    pub fn set_file_path(&mut self, id: &str, path: Option<String>) -> EditorResult<()> {
        self.graph.set_file_path(id, path)?;
        self.commit("set file path");
        Ok(())
    }

    pub fn set_layer_type(&mut self, id: &str, layer: Option<LayerType>) -> EditorResult<()> {
        self.graph.set_layer_type(id, layer)?;
        self.commit("set layer");
        Ok(())
    }

    pub fn set_shape(&mut self, id: &str, shape: NodeShape) -> EditorResult<()> {
        self.graph.set_shape(id, shape)?;
        self.commit("set shape");
        Ok(())
    }

    /// Recolors every selected node; `None` restores the default.
    pub fn set_selection_color(&mut self, color: Option<&str>) -> EditorResult<()> {
        let ids = self.selection.node_ids();
        if ids.is_empty() {
            return Ok(());
        }
        self.graph.set_color(&ids, color)?;
        self.commit("recolor");
        Ok(())
    }

    pub fn set_selected_edge_style(&mut self, patch: &EdgeStylePatch) -> EditorResult<()> {
        let Some(edge_id) = self.selection.edge().map(str::to_string) else {
            return Ok(());
        };
        self.graph.set_edge_style(&edge_id, patch)?;
        self.commit("restyle edge");
        Ok(())
    }

    pub fn attach_annotation(&mut self, note: &str, host: &str, position: AttachPosition) -> EditorResult<()> {
        self.graph.attach_annotation(note, host, position)?;
        self.commit("attach annotation");
        Ok(())
    }

    pub fn detach_annotation(&mut self, note: &str) -> EditorResult<()> {
        self.graph.detach_annotation(note)?;
        self.commit("detach annotation");
        Ok(())
    }

    /// Makes `id` a child of `parent` ("expand into").
    pub fn set_parent(&mut self, id: &str, parent: Option<&str>) -> EditorResult<()> {
        self.graph.set_parent(id, parent)?;
        if let Some(parent) = parent {
            self.expanded.expand(parent);
        }
        self.commit("reparent");
        Ok(())
    }

    pub fn flatten_into(&mut self, focus: &str) -> EditorResult<usize> {
        let changed = self.graph.flatten_into(focus)?;
        if changed > 0 {
            self.commit("flatten");
        }
        Ok(changed)
    }

    // ---- selection commands ----

    pub fn select_nodes<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.replace(ids);
        self.selection.retain_existing(&self.graph);
    }

    pub fn select_all(&mut self) {
        let ids: Vec<String> = self.visible().nodes.iter().map(|n| n.id.clone()).collect();
        self.selection.replace(ids);
    }

    pub fn select_edge(&mut self, id: &str) -> EditorResult<()> {
        if self.graph.edge(id).is_none() {
            return Err(EditorError::UnknownEdge(id.to_string()));
        }
        self.selection.select_edge(id);
        Ok(())
    }

    pub fn select_group(&mut self, group_id: &str) -> EditorResult<()> {
        if self.graph.group(group_id).is_none() {
            return Err(EditorError::UnknownGroup(group_id.to_string()));
        }
        let ids: Vec<String> = self.graph.members_of(group_id).iter().map(|n| n.id.clone()).collect();
        self.selection.replace(ids);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn place(&mut self, result: &LayoutResult) {
        let moved: Vec<(&str, Point)> = result
            .positions
            .iter()
            .filter(|(id, _)| self.graph.contains_node(id))
            .map(|(id, at)| (id.as_str(), *at))
            .collect();
        let hosts: Vec<String> = moved.iter().map(|(id, _)| id.to_string()).collect();
        if let Err(err) = self.graph.move_nodes(moved) {
            debug!(%err, "layout positions rejected");
            return;
        }
        for host in &hosts {
            self.graph.repin_annotations(host);
        }
    }

    fn apply_positions(&mut self, positions: BTreeMap<String, Point>, what: &str) -> EditorResult<()> {
        self.graph
            .move_nodes(positions.iter().map(|(id, at)| (id.as_str(), *at)))?;
        for id in positions.keys() {
            self.graph.repin_annotations(id);
        }
        self.commit(what);
        Ok(())
    }

    pub fn align_selection(&mut self, alignment: Alignment) -> EditorResult<()> {
        let positions = align(&self.graph, self.selection.nodes(), alignment)?;
        self.apply_positions(positions, "align")
    }

    pub fn distribute_selection(&mut self, axis: Axis) -> EditorResult<()> {
        let positions = distribute(&self.graph, self.selection.nodes(), axis)?;
        self.apply_positions(positions, "distribute")
    }

    /// Offered when the selection is not exactly one existing group.
    pub fn group_selection(&mut self) -> EditorResult<Group> {
        let color = self
            .config
            .theme
            .group_color(self.graph.groups().len())
            .to_string();
        let group = self
            .graph
            .create_group(&self.selection.node_ids(), None, &color)?;
        self.commit("group");
        Ok(group)
    }

    /// Dissolves the group when the selection is exactly its members.
    pub fn ungroup_selection(&mut self) -> EditorResult<Option<Group>> {
        let Some(group_id) = self
            .graph
            .group_fully_selected(self.selection.nodes())
            .map(|g| g.id.clone())
        else {
            return Ok(None);
        };
        let group = self.graph.dissolve_group(&group_id)?;
        self.commit("ungroup");
        Ok(Some(group))
    }

    pub fn rename_group(&mut self, group_id: &str, name: &str) -> EditorResult<()> {
        self.graph.rename_group(group_id, name)?;
        self.commit("rename group");
        Ok(())
    }

    pub fn copy(&mut self) {
        self.clipboard = if !self.selection.nodes().is_empty() {
            Clipboard::copy_nodes(&self.graph, self.selection.nodes())
        } else if let Some(edge) = self.selection.edge() {
            Clipboard::copy_edge(&self.graph, edge)
        } else {
            return;
        };
    }

    /// Pastes the clipboard at the configured offset and selects the copies.
    pub fn paste(&mut self) -> EditorResult<Vec<String>> {
        let canvas = &self.config.canvas;
        let created = self
            .clipboard
            .paste(&mut self.graph, canvas.paste_offset_x, canvas.paste_offset_y)?;
        if !created.is_empty() {
            self.selection.replace(created.iter().cloned());
            self.commit("paste");
        }
        Ok(created)
    }

    // ---- hierarchy and navigation ----

    /// Toggles inline expansion of `id` and re-runs the tree layout.
    pub fn toggle_expand(&mut self, id: &str) -> EditorResult<bool> {
        if !self.graph.contains_node(id) {
            return Err(EditorError::UnknownNode(id.to_string()));
        }
        let expanded = self.expanded.toggle(id, &self.graph);
        self.relayout_view();
        Ok(expanded)
    }

    pub fn expand_all(&mut self) {
        self.expanded.expand_all(&self.graph);
        self.relayout_view();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.collapse_all();
        self.relayout_view();
    }

    /// Enters `id` when it has children. Returns whether the view changed.
    pub fn drill_down(&mut self, id: &str) -> bool {
        if !self.graph.has_children(id) {
            return false;
        }
        self.view_path.push(id.to_string());
        self.expanded.expand(id);
        self.selection.clear();
        self.relayout_view();
        true
    }

    pub fn go_back(&mut self) -> bool {
        if self.view_path.pop().is_none() {
            return false;
        }
        self.selection.clear();
        true
    }

    /// Keeps the first `level` entries of the view path; 0 returns to the roots.
    pub fn go_to_level(&mut self, level: usize) {
        self.view_path.truncate(level);
        self.selection.clear();
    }

    pub fn breadcrumb(&self) -> Vec<BreadcrumbEntry> {
        self.view_path
            .iter()
            .filter_map(|id| self.graph.node(id))
            .map(|n| BreadcrumbEntry {
                id: n.id.clone(),
                name: n.name.clone(),
            })
            .collect()
    }

    // ---- layout ----

    fn compute(&self, algorithm: LayoutAlgorithm) -> LayoutResult {
        let focus = focus_of(&self.view_path);
        let visible = self.graph.visible_set(focus, &self.expanded);
        let input = LayoutInput::from_visible(&visible, focus, &self.expanded, self.direction);
        compute_layout(algorithm, &input, &self.config.layout)
    }

    /// Lays out the visible layer and commits the new positions.
    pub fn apply_layout(&mut self, algorithm: LayoutAlgorithm) -> LayoutResult {
        let result = self.compute(algorithm);
        if !result.is_empty() {
            self.place(&result);
            self.commit(algorithm.as_str());
        }
        result
    }

    /// Tree layout after expanding, collapsing or drilling. Navigation is not
    /// an edit: the current history entry is amended and the revision stays.
    fn relayout_view(&mut self) {
        let result = self.compute(LayoutAlgorithm::Tree);
        if !result.is_empty() {
            self.place(&result);
            self.history.amend(self.graph.to_content());
        }
    }

    /// Expands everything, lays it out as a tree and resets the view.
    pub fn auto_arrange(&mut self) -> LayoutResult {
        self.expanded.expand_all(&self.graph);
        let result = self.apply_layout(LayoutAlgorithm::Tree);
        self.view.reset();
        result
    }

    // ---- pointer input ----

    pub fn hit_test(&self, screen: Point) -> HitTarget {
        let model = self.view.screen_to_model(screen);
        let canvas = &self.config.canvas;
        let visible = self.visible();

        if let Some(edge) = self.selection.edge().and_then(|id| self.graph.edge(id)) {
            let mut best: Option<(f32, EdgeEnd)> = None;
            for end in [EdgeEnd::From, EdgeEnd::To] {
                let (node_id, anchor) = edge.endpoint(end);
                let Some(node) = self.graph.node(node_id) else {
                    continue;
                };
                let distance = anchor_point(node, anchor).distance(model);
                if distance <= canvas.handle_hit_radius && best.is_none_or(|(d, _)| distance < d) {
                    best = Some((distance, end));
                }
            }
            if let Some((_, end)) = best {
                return HitTarget::EdgeHandle {
                    edge_id: edge.id.clone(),
                    end,
                };
            }
        }

        let topmost = visible.nodes.iter().rev().copied();
        if let Some(target) = nearest_anchor(topmost, model, canvas.anchor_hit_radius, None) {
            return HitTarget::Anchor {
                node_id: target.node_id,
                anchor: target.anchor,
            };
        }

        if let Some(node) = self
            .selection
            .single()
            .filter(|id| visible.contains_node(id))
            .and_then(|id| self.graph.node(id))
        {
            let size = canvas.resize_handle_size;
            let handle = Rect::new(node.x + node.width - size, node.y + node.height - size, size, size);
            if handle.contains(model) {
                return HitTarget::ResizeHandle {
                    node_id: node.id.clone(),
                };
            }
        }

        if let Some(node) = visible.nodes.iter().rev().find(|n| n.rect().contains(model)) {
            return HitTarget::Node {
                node_id: node.id.clone(),
            };
        }

        let mut nearest: Option<(f32, &str)> = None;
        for edge in &visible.edges {
            let (Some(from), Some(to)) = (self.graph.node(&edge.from), self.graph.node(&edge.to)) else {
                continue;
            };
            let distance = CubicPath::for_edge(edge, from, to).distance_to(model);
            if distance <= canvas.edge_hit_tolerance && nearest.is_none_or(|(d, _)| distance < d) {
                nearest = Some((distance, edge.id.as_str()));
            }
        }
        if let Some((_, edge_id)) = nearest {
            return HitTarget::Edge {
                edge_id: edge_id.to_string(),
            };
        }
        HitTarget::Background
    }

    /// Starts whatever gesture the pointer lands on and returns the target.
    pub fn pointer_down(&mut self, input: PointerInput) -> EditorResult<HitTarget> {
        if !matches!(self.gesture, Gesture::Idle) {
            return Err(EditorError::GestureInProgress);
        }
        let pans = matches!(input.button, PointerButton::Middle | PointerButton::Secondary)
            || input.modifiers.alt;
        if pans {
            self.view.begin_pan(input.screen);
            self.gesture = Gesture::Panning;
            return Ok(HitTarget::Background);
        }
        let target = self.hit_test(input.screen);
        self.pointer_down_on(target.clone(), input)?;
        Ok(target)
    }

    /// Like [`Editor::pointer_down`] with the target already resolved by the
    /// host.
    pub fn pointer_down_on(&mut self, target: HitTarget, input: PointerInput) -> EditorResult<()> {
        if !matches!(self.gesture, Gesture::Idle) {
            return Err(EditorError::GestureInProgress);
        }
        let model = self.view.screen_to_model(input.screen);
        self.gesture = match target {
            HitTarget::EdgeHandle { edge_id, end } => {
                let edge = self
                    .graph
                    .edge(&edge_id)
                    .ok_or_else(|| EditorError::UnknownEdge(edge_id.clone()))?;
                Gesture::Rebinding(EndpointRebind::new(edge, end, model))
            }
            HitTarget::Anchor { node_id, anchor } => {
                if !self.graph.contains_node(&node_id) {
                    return Err(EditorError::UnknownNode(node_id));
                }
                Gesture::Connecting(PendingConnection::new(node_id, anchor, model))
            }
            HitTarget::ResizeHandle { node_id } => {
                let node = self
                    .graph
                    .node(&node_id)
                    .ok_or_else(|| EditorError::UnknownNode(node_id.clone()))?;
                Gesture::Resizing(ResizeState::begin(node, model, self.config.canvas.min_node_size()))
            }
            HitTarget::Node { node_id } => {
                if !self.graph.contains_node(&node_id) {
                    return Err(EditorError::UnknownNode(node_id));
                }
                if input.modifiers.is_additive() {
                    self.selection.toggle(&node_id);
                    Gesture::Idle
                } else {
                    if !self.selection.contains(&node_id) {
                        self.selection.replace([node_id]);
                    }
                    Gesture::Dragging(DragState::begin(&self.graph, self.selection.nodes(), model))
                }
            }
            HitTarget::Edge { edge_id } => {
                self.select_edge(&edge_id)?;
                Gesture::Idle
            }
            HitTarget::Background => Gesture::BoxSelecting(BoxSelect::new(model, input.modifiers.is_additive())),
        };
        Ok(())
    }

    pub fn pointer_move(&mut self, screen: Point) {
        let model = self.view.screen_to_model(screen);
        let canvas = &self.config.canvas;
        let guide_threshold = canvas.guide_threshold / self.view.zoom();
        let visible = self.graph.visible_set(focus_of(&self.view_path), &self.expanded);
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Dragging(drag) => {
                let selected = self.selection.nodes();
                let others = visible.nodes.iter().copied().filter(|n| !selected.contains(&n.id));
                drag.update(model, others, guide_threshold);
            }
            Gesture::BoxSelecting(rubber) => rubber.current = model,
            Gesture::Resizing(resize) => resize.update(model),
            Gesture::Connecting(pending) => {
                pending.update(visible.nodes.iter().copied(), model, canvas.snap_radius);
            }
            Gesture::Rebinding(rebind) => {
                rebind.update(visible.nodes.iter().copied(), model, canvas.snap_radius);
            }
            Gesture::Panning => self.view.pan_drag_to(screen),
            Gesture::MiniMap(_) => {}
        }
    }

    /// Ends the active gesture, committing it if it produced a change.
    /// Returns whether the model changed.
    pub fn pointer_up(&mut self, screen: Point) -> EditorResult<bool> {
        self.pointer_move(screen);
        match mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle | Gesture::MiniMap(_) => Ok(false),
            Gesture::Panning => {
                self.view.end_pan();
                Ok(false)
            }
            Gesture::BoxSelecting(rubber) => {
                let visible = self.graph.visible_set(focus_of(&self.view_path), &self.expanded);
                rubber.apply(visible.nodes.iter().copied(), &mut self.selection);
                Ok(false)
            }
            Gesture::Dragging(drag) => {
                let Some(positions) = drag.finish(&self.graph) else {
                    return Ok(false);
                };
                self.apply_positions(positions, "drag")?;
                Ok(true)
            }
            Gesture::Resizing(resize) => {
                if !resize.changed() {
                    return Ok(false);
                }
                let size = resize.preview();
                self.graph.resize_node(
                    &resize.node_id,
                    size.width,
                    size.height,
                    self.config.canvas.min_node_size(),
                )?;
                self.graph.repin_annotations(&resize.node_id);
                self.commit("resize");
                Ok(true)
            }
            Gesture::Connecting(pending) => {
                let Some(target) = pending.target.filter(|t| t.node_id != pending.from_node) else {
                    debug!("connection released over nothing");
                    return Ok(false);
                };
                match self.connect(&pending.from_node, pending.from_anchor, &target.node_id, target.anchor) {
                    Ok(_) => Ok(true),
                    Err(err) => ignore_refused_link(err),
                }
            }
            Gesture::Rebinding(rebind) => {
                let Some(target) = rebind.target.filter(|t| t.node_id != rebind.fixed_node) else {
                    return Ok(false);
                };
                let rebound = self
                    .graph
                    .update_edge_endpoint(&rebind.edge_id, rebind.end, &target.node_id, target.anchor);
                if let Err(err) = rebound {
                    return ignore_refused_link(err);
                }
                self.commit("rebind edge");
                Ok(true)
            }
        }
    }

    /// Drops the active gesture without touching the model.
    pub fn cancel_gesture(&mut self) -> bool {
        match mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle => false,
            Gesture::Panning => {
                self.view.end_pan();
                true
            }
            _ => true,
        }
    }

    /// Double click on a node with children drills into it.
    pub fn double_click(&mut self, screen: Point) -> bool {
        match self.hit_test(screen) {
            HitTarget::Node { node_id } => self.drill_down(&node_id),
            _ => false,
        }
    }

    pub fn wheel(&mut self, input: WheelInput) {
        self.view.handle_wheel(input);
    }

    /// Returns whether the key was handled.
    pub fn key_down(&mut self, input: KeyInput) -> EditorResult<bool> {
        let command = input.modifiers.is_command();
        match input.key {
            Key::Delete | Key::Backspace => Ok(self.delete_selection() > 0),
            Key::Escape => {
                if !self.cancel_gesture() {
                    self.selection.clear();
                }
                Ok(true)
            }
            Key::Char(c) if command => match c.to_ascii_lowercase() {
                'c' => {
                    self.copy();
                    Ok(true)
                }
                'v' => Ok(!self.paste()?.is_empty()),
                'a' => {
                    self.select_all();
                    Ok(true)
                }
                'z' if input.modifiers.shift => Ok(self.redo()),
                'z' => Ok(self.undo()),
                'y' => Ok(self.redo()),
                _ => Ok(false),
            },
            Key::Char(_) => Ok(false),
        }
    }

    // ---- minimap ----

    fn projector(&self) -> MiniMapProjector {
        MiniMapProjector::for_view(&self.config.minimap, &self.visible(), &self.view)
    }

    pub fn minimap(&self) -> MiniMapFrame {
        let visible = self.visible();
        self.projector()
            .project(&self.graph, &visible, self.view.viewbox(), &self.config.theme)
    }

    /// Press on the overview: grabs the viewport indicator, or jumps there.
    pub fn minimap_pointer_down(&mut self, overview: Point) -> EditorResult<()> {
        if !matches!(self.gesture, Gesture::Idle) {
            return Err(EditorError::GestureInProgress);
        }
        let projector = self.projector();
        match MiniMapDrag::begin(projector, self.view.viewbox(), overview) {
            Some(drag) => self.gesture = Gesture::MiniMap(drag),
            None => projector.click(&mut self.view, overview),
        }
        Ok(())
    }

    pub fn minimap_pointer_move(&mut self, overview: Point) {
        if let Gesture::MiniMap(drag) = &self.gesture {
            drag.drag_to(&mut self.view, overview);
        }
    }

    pub fn minimap_pointer_up(&mut self) {
        if matches!(self.gesture, Gesture::MiniMap(_)) {
            self.gesture = Gesture::Idle;
        }
    }

    // ---- previews for the host ----

    pub fn gesture(&self) -> GestureKind {
        match self.gesture {
            Gesture::Idle => GestureKind::Idle,
            Gesture::Dragging(_) => GestureKind::Dragging,
            Gesture::BoxSelecting(_) => GestureKind::BoxSelecting,
            Gesture::Resizing(_) => GestureKind::Resizing,
            Gesture::Connecting(_) => GestureKind::Connecting,
            Gesture::Rebinding(_) => GestureKind::Rebinding,
            Gesture::Panning => GestureKind::Panning,
            Gesture::MiniMap(_) => GestureKind::MiniMap,
        }
    }

    pub fn guides(&self) -> &[Guide] {
        match &self.gesture {
            Gesture::Dragging(drag) => drag.guides(),
            _ => &[],
        }
    }

    pub fn selection_box(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::BoxSelecting(rubber) => Some(rubber.rect()),
            _ => None,
        }
    }

    /// Anchor the pending connection or re-bind would attach to.
    pub fn snap_target(&self) -> Option<&AnchorTarget> {
        match &self.gesture {
            Gesture::Connecting(pending) => pending.target.as_ref(),
            Gesture::Rebinding(rebind) => rebind.target.as_ref(),
            _ => None,
        }
    }

    /// Segment to draw for a connection or endpoint being dragged.
    pub fn connection_preview(&self) -> Option<(Point, Point)> {
        match &self.gesture {
            Gesture::Connecting(pending) => {
                let from = self.graph.node(&pending.from_node)?;
                Some(pending.preview(from))
            }
            Gesture::Rebinding(rebind) => {
                let edge = self.graph.edge(&rebind.edge_id)?;
                let (fixed_id, fixed_anchor) = edge.endpoint(rebind.end.opposite());
                let fixed = self.graph.node(fixed_id)?;
                let end = rebind.target.as_ref().map_or(rebind.pointer, |t| t.point);
                Some((anchor_point(fixed, fixed_anchor), end))
            }
            _ => None,
        }
    }

    /// Visible nodes as they should be drawn right now, with drag and resize
    /// previews applied.
    pub fn display_nodes(&self) -> Vec<Node> {
        self.visible()
            .nodes
            .into_iter()
            .map(|node| {
                let mut shown = node.clone();
                match &self.gesture {
                    Gesture::Dragging(drag) => {
                        if let Some(at) = drag.preview().get(&node.id) {
                            shown.x = at.x;
                            shown.y = at.y;
                        }
                    }
                    Gesture::Resizing(resize) if resize.node_id == node.id => {
                        let size = resize.preview();
                        shown.width = size.width;
                        shown.height = size.height;
                    }
                    _ => {}
                }
                shown
            })
            .collect()
    }

    pub fn selected_ids(&self) -> &BTreeSet<String> {
        self.selection.nodes()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
