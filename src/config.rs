use crate::geometry::Size;
use crate::layout::TreeDirection;
use crate::theme::Theme;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    pub default_node_width: f32,
    pub default_node_height: f32,
    pub min_node_width: f32,
    pub min_node_height: f32,
    pub paste_offset_x: f32,
    pub paste_offset_y: f32,
    /// Distance within which a dragged connection locks onto an anchor.
    pub snap_radius: f32,
    /// Screen distance within which a single dragged node snaps to a guide.
    pub guide_threshold: f32,
    pub anchor_hit_radius: f32,
    pub handle_hit_radius: f32,
    pub resize_handle_size: f32,
    pub edge_hit_tolerance: f32,
    pub auto_layout_on_load: bool,
}

impl CanvasConfig {
    pub fn default_node_size(&self) -> Size {
        Size::new(self.default_node_width, self.default_node_height)
    }

    pub fn min_node_size(&self) -> Size {
        Size::new(self.min_node_width, self.min_node_height)
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            default_node_width: 120.0,
            default_node_height: 50.0,
            min_node_width: 60.0,
            min_node_height: 30.0,
            paste_offset_x: 30.0,
            paste_offset_y: 30.0,
            snap_radius: 35.0,
            guide_threshold: 8.0,
            anchor_hit_radius: 7.0,
            handle_hit_radius: 8.0,
            resize_handle_size: 10.0,
            edge_hit_tolerance: 6.0,
            auto_layout_on_load: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub wheel_zoom_in: f32,
    pub wheel_zoom_out: f32,
    pub surface_width: f32,
    pub surface_height: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.3,
            max_zoom: 3.0,
            wheel_zoom_in: 1.05,
            wheel_zoom_out: 0.95,
            surface_width: 1200.0,
            surface_height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeLayoutConfig {
    pub horizontal_layer_gap: f32,
    pub vertical_layer_gap: f32,
    pub horizontal_sibling_gap: f32,
    pub vertical_sibling_gap: f32,
    pub start_x: f32,
    pub start_y: f32,
}

impl TreeLayoutConfig {
    pub fn layer_gap(&self, direction: TreeDirection) -> f32 {
        match direction {
            TreeDirection::Horizontal => self.horizontal_layer_gap,
            TreeDirection::Vertical => self.vertical_layer_gap,
        }
    }

    pub fn sibling_gap(&self, direction: TreeDirection) -> f32 {
        match direction {
            TreeDirection::Horizontal => self.horizontal_sibling_gap,
            TreeDirection::Vertical => self.vertical_sibling_gap,
        }
    }
}

impl Default for TreeLayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_layer_gap: 200.0,
            vertical_layer_gap: 100.0,
            horizontal_sibling_gap: 30.0,
            vertical_sibling_gap: 40.0,
            start_x: 80.0,
            start_y: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForceLayoutConfig {
    pub repulsion: f32,
    pub attraction: f32,
    pub damping: f32,
    pub min_distance: f32,
    pub max_velocity: f32,
    pub iterations: usize,
    /// Total per-iteration movement under which the simulation stops early.
    pub settle_threshold: f32,
    pub center_x: f32,
    pub center_y: f32,
}

impl Default for ForceLayoutConfig {
    fn default() -> Self {
        Self {
            repulsion: 5000.0,
            attraction: 0.01,
            damping: 0.9,
            min_distance: 50.0,
            max_velocity: 50.0,
            iterations: 100,
            settle_threshold: 0.5,
            center_x: 400.0,
            center_y: 300.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridLayoutConfig {
    pub start_x: f32,
    pub start_y: f32,
    pub spacing_x: f32,
    pub spacing_y: f32,
}

impl Default for GridLayoutConfig {
    fn default() -> Self {
        Self {
            start_x: 100.0,
            start_y: 100.0,
            spacing_x: 50.0,
            spacing_y: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircularLayoutConfig {
    pub center_x: f32,
    pub center_y: f32,
    pub spacing: f32,
    pub min_radius: f32,
}

impl Default for CircularLayoutConfig {
    fn default() -> Self {
        Self {
            center_x: 400.0,
            center_y: 300.0,
            spacing: 200.0,
            min_radius: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub direction: TreeDirection,
    pub tree: TreeLayoutConfig,
    pub force: ForceLayoutConfig,
    pub grid: GridLayoutConfig,
    pub circular: CircularLayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MiniMapConfig {
    pub width: f32,
    pub height: f32,
    pub padding: f32,
}

impl Default for MiniMapConfig {
    fn default() -> Self {
        Self {
            width: 180.0,
            height: 120.0,
            padding: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Used when there is nothing to draw.
    pub width: f32,
    pub height: f32,
    pub padding: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            padding: 40.0,
            background: Theme::dark().background,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub theme: Theme,
    pub canvas: CanvasConfig,
    pub view: ViewConfig,
    pub history: HistoryConfig,
    pub layout: LayoutConfig,
    pub minimap: MiniMapConfig,
    pub render: RenderConfig,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let view = &self.view;
        if !(view.min_zoom > 0.0 && view.min_zoom <= view.max_zoom) {
            bail!("zoom bounds [{}, {}] are not a valid range", view.min_zoom, view.max_zoom);
        }
        let canvas = &self.canvas;
        if canvas.min_node_width <= 0.0 || canvas.min_node_height <= 0.0 {
            bail!("minimum node size must be positive");
        }
        if canvas.default_node_width < canvas.min_node_width
            || canvas.default_node_height < canvas.min_node_height
        {
            bail!("default node size is below the minimum node size");
        }
        if self.history.capacity == 0 {
            bail!("history capacity must be at least 1");
        }
        if self.minimap.width <= 0.0 || self.minimap.height <= 0.0 {
            bail!("minimap must have a positive size");
        }
        Ok(())
    }
}

/// Theme overrides layered on top of the named base theme.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    text_color: Option<String>,
    node_color: Option<String>,
    edge_color: Option<String>,
    selection_color: Option<String>,
    group_palette: Option<Vec<String>>,
    depth_palette: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    canvas: Option<CanvasConfig>,
    view: Option<ViewConfig>,
    history: Option<HistoryConfig>,
    layout: Option<LayoutConfig>,
    #[serde(rename = "miniMap", alias = "minimap")]
    minimap: Option<MiniMapConfig>,
    render: Option<RenderConfig>,
}

/// Reads a JSON5 config file; `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("parsing config {}", path.display()))
}

/// Merges a JSON5 document over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    match parsed.theme.as_deref() {
        None | Some("dark") | Some("default") => {}
        Some("light") => config.theme = Theme::light(),
        Some(other) => bail!("unknown theme `{other}` (expected dark or light)"),
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.node_color {
            config.theme.node_color = v;
        }
        if let Some(v) = vars.edge_color {
            config.theme.edge_color = v;
        }
        if let Some(v) = vars.selection_color {
            config.theme.selection_color = v;
        }
        if let Some(v) = vars.group_palette {
            config.theme.group_palette = v;
        }
        if let Some(v) = vars.depth_palette {
            config.theme.depth_palette = v;
        }
    }

    config.render.background = config.theme.background.clone();
    if let Some(canvas) = parsed.canvas {
        config.canvas = canvas;
    }
    if let Some(view) = parsed.view {
        config.view = view;
    }
    if let Some(history) = parsed.history {
        config.history = history;
    }
    if let Some(layout) = parsed.layout {
        config.layout = layout;
    }
    if let Some(minimap) = parsed.minimap {
        config.minimap = minimap;
    }
    if let Some(render) = parsed.render {
        config.render = render;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.canvas.snap_radius, 35.0);
        assert_eq!(config.view.min_zoom, 0.3);
        assert_eq!(config.history.capacity, 50);
        assert_eq!(config.layout.tree.layer_gap(TreeDirection::Horizontal), 200.0);
        assert_eq!(config.layout.tree.sibling_gap(TreeDirection::Vertical), 40.0);
    }

    #[test]
    fn partial_json5_merges_over_defaults() {
        let file = write_config(
            r##"{
                // comments and trailing commas are fine
                theme: "light",
                themeVariables: { nodeColor: "#ff0000" },
                canvas: { snapRadius: 20, },
                layout: { direction: "vertical", force: { iterations: 10 } },
                miniMap: { width: 240 },
            }"##,
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.theme.node_color, "#ff0000");
        assert_eq!(config.theme.background, Theme::light().background);
        assert_eq!(config.canvas.snap_radius, 20.0);
        assert_eq!(config.canvas.min_node_width, 60.0);
        assert_eq!(config.layout.direction, TreeDirection::Vertical);
        assert_eq!(config.layout.force.iterations, 10);
        assert_eq!(config.layout.force.repulsion, 5000.0);
        assert_eq!(config.minimap.width, 240.0);
        assert_eq!(config.minimap.height, 120.0);
    }

    #[test]
    fn rejects_inverted_zoom_bounds() {
        let file = write_config(r#"{ view: { minZoom: 4, maxZoom: 2 } }"#);
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn rejects_unknown_theme() {
        let file = write_config(r#"{ theme: "neon" }"#);
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("neon"));
    }

    #[test]
    fn parses_config_text() {
        let config = parse_config(r#"{ history: { capacity: 5 } }"#).unwrap();
        assert_eq!(config.history.capacity, 5);
        assert!(parse_config("{ history: ").is_err());
    }
}
