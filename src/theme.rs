use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_COLOR: &str = "#3b82f6";
pub const DEFAULT_EDGE_COLOR: &str = "#64748b";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub text_color: String,
    pub node_color: String,
    pub edge_color: String,
    pub code_color: String,
    pub annotation_color: String,
    pub selection_color: String,
    pub hover_color: String,
    pub selected_edge_color: String,
    pub guide_color: String,
    pub anchor_color: String,
    pub anchor_active_color: String,
    pub minimap_background: String,
    pub minimap_viewport: String,
    /// Swatches offered for nodes and edges.
    pub node_palette: Vec<String>,
    /// Cycled through when groups are created.
    pub group_palette: Vec<String>,
    /// Feature nodes darken toward the root; deeper levels reuse the last entry.
    pub depth_palette: Vec<String>,
}

fn palette(colors: &[&str]) -> Vec<String> {
    colors.iter().map(|c| c.to_string()).collect()
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#0f172a".to_string(),
            text_color: "#f1f5f9".to_string(),
            node_color: DEFAULT_NODE_COLOR.to_string(),
            edge_color: DEFAULT_EDGE_COLOR.to_string(),
            code_color: "#10b981".to_string(),
            annotation_color: "#fbbf24".to_string(),
            selection_color: "#fbbf24".to_string(),
            hover_color: "#60a5fa".to_string(),
            selected_edge_color: "#ef4444".to_string(),
            guide_color: "#f472b6".to_string(),
            anchor_color: "#64748b".to_string(),
            anchor_active_color: "#10b981".to_string(),
            minimap_background: "#1e293b".to_string(),
            minimap_viewport: "#3b82f6".to_string(),
            node_palette: palette(&["#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#06b6d4"]),
            group_palette: palette(&["#f472b6", "#a78bfa", "#60a5fa", "#34d399", "#fbbf24", "#fb923c"]),
            depth_palette: palette(&["#1e40af", "#2563eb", "#3b82f6", "#60a5fa", "#93c5fd", "#bfdbfe"]),
        }
    }

    pub fn light() -> Self {
        Self {
            background: "#ffffff".to_string(),
            text_color: "#1c2430".to_string(),
            minimap_background: "#f1f5f9".to_string(),
            anchor_color: "#94a3b8".to_string(),
            ..Self::dark()
        }
    }

    pub fn depth_color(&self, depth: usize) -> &str {
        match self.depth_palette.len() {
            0 => &self.node_color,
            len => &self.depth_palette[depth.min(len - 1)],
        }
    }

    /// Color for the `index`-th group, `node_color` when the palette is empty.
    pub fn group_color(&self, index: usize) -> &str {
        if self.group_palette.is_empty() {
            return &self.node_color;
        }
        &self.group_palette[index % self.group_palette.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_color_saturates() {
        let theme = Theme::dark();
        assert_eq!(theme.depth_color(0), "#1e40af");
        assert_eq!(theme.depth_color(40), "#bfdbfe");
    }

    #[test]
    fn group_colors_cycle() {
        let theme = Theme::light();
        assert_eq!(theme.group_color(0), theme.group_color(6));
        assert_ne!(theme.group_color(0), theme.group_color(1));
    }
}
