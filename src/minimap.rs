//! Scaled overview of the visible layer with a viewport indicator.

use serde::Serialize;

use crate::config::MiniMapConfig;
use crate::geometry::{Point, Rect, Size, bounds_of};
use crate::graph::{GraphModel, VisibleSet};
use crate::theme::Theme;
use crate::view::ViewTransform;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniMapNode {
    pub id: String,
    pub rect: Rect,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MiniMapSegment {
    pub from: Point,
    pub to: Point,
}

/// Everything needed to draw the overview, already in overview pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniMapFrame {
    pub size: Size,
    pub scale: f32,
    pub nodes: Vec<MiniMapNode>,
    pub edges: Vec<MiniMapSegment>,
    pub viewport: Rect,
}

/// Mapping between overview pixels and model space for one content extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiniMapProjector {
    size: Size,
    content: Rect,
    scale: f32,
    offset: Point,
}

impl MiniMapProjector {
    /// `content` is the union of the node bounds and the viewbox; with no
    /// nodes it is the surface itself.
    pub fn new(config: &MiniMapConfig, nodes: Option<Rect>, viewbox: Rect, surface: Size) -> Self {
        let raw = match nodes {
            Some(bounds) => bounds.union(&viewbox),
            None => Rect::new(0.0, 0.0, surface.width, surface.height),
        };
        let content = raw.inflate(config.padding);
        let size = Size::new(config.width, config.height);
        let inner_w = (config.width - config.padding * 2.0).max(1.0);
        let inner_h = (config.height - config.padding * 2.0).max(1.0);
        let scale = (inner_w / content.width.max(1.0))
            .min(inner_h / content.height.max(1.0))
            .min(1.0);
        let offset = Point::new(
            (size.width - content.width * scale) / 2.0,
            (size.height - content.height * scale) / 2.0,
        );
        Self {
            size,
            content,
            scale,
            offset,
        }
    }

    pub fn for_view(config: &MiniMapConfig, visible: &VisibleSet<'_>, view: &ViewTransform) -> Self {
        let nodes = bounds_of(visible.nodes.iter().map(|n| n.rect()));
        Self::new(config, nodes, view.viewbox(), view.surface())
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn to_overview(&self, model: Point) -> Point {
        Point::new(
            (model.x - self.content.x) * self.scale + self.offset.x,
            (model.y - self.content.y) * self.scale + self.offset.y,
        )
    }

    pub fn to_model(&self, overview: Point) -> Point {
        Point::new(
            (overview.x - self.offset.x) / self.scale + self.content.x,
            (overview.y - self.offset.y) / self.scale + self.content.y,
        )
    }

    fn rect_to_overview(&self, rect: Rect) -> Rect {
        let origin = self.to_overview(Point::new(rect.x, rect.y));
        Rect::new(origin.x, origin.y, rect.width * self.scale, rect.height * self.scale)
    }

    pub fn project(
        &self,
        graph: &GraphModel,
        visible: &VisibleSet<'_>,
        viewbox: Rect,
        theme: &Theme,
    ) -> MiniMapFrame {
        let nodes = visible
            .nodes
            .iter()
            .map(|node| MiniMapNode {
                id: node.id.clone(),
                rect: self.rect_to_overview(node.rect()),
                color: graph.display_color(node, theme).to_string(),
            })
            .collect();
        let edges = visible
            .edges
            .iter()
            .filter_map(|edge| {
                let from = graph.node(&edge.from)?;
                let to = graph.node(&edge.to)?;
                Some(MiniMapSegment {
                    from: self.to_overview(from.center()),
                    to: self.to_overview(to.center()),
                })
            })
            .collect();
        MiniMapFrame {
            size: self.size,
            scale: self.scale,
            nodes,
            edges,
            viewport: self.rect_to_overview(viewbox),
        }
    }

    /// Pans `view` so the clicked overview point sits at the view center.
    pub fn click(&self, view: &mut ViewTransform, overview: Point) {
        view.center_on(self.to_model(overview));
    }

    pub fn hits_viewport(&self, viewbox: Rect, overview: Point) -> bool {
        self.rect_to_overview(viewbox).contains(overview)
    }
}

/// Drag of the viewport indicator. The projector is frozen at drag start so
/// the mapping does not shift under the pointer as the viewbox moves, and the
/// indicator keeps the spot where it was grabbed under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiniMapDrag {
    projector: MiniMapProjector,
    /// Model offset from the grabbed point to the viewbox center.
    grab: Point,
}

impl MiniMapDrag {
    pub fn begin(projector: MiniMapProjector, viewbox: Rect, overview: Point) -> Option<Self> {
        if !projector.hits_viewport(viewbox, overview) {
            return None;
        }
        let center = viewbox.center();
        let grabbed = projector.to_model(overview);
        Some(Self {
            projector,
            grab: Point::new(center.x - grabbed.x, center.y - grabbed.y),
        })
    }

    pub fn drag_to(&self, view: &mut ViewTransform, overview: Point) {
        let target = self.projector.to_model(overview).offset(self.grab.x, self.grab.y);
        view.center_on(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MiniMapConfig {
        MiniMapConfig::default()
    }

    #[test]
    fn small_content_is_not_upscaled() {
        let projector = MiniMapProjector::new(
            &config(),
            Some(Rect::new(0.0, 0.0, 20.0, 20.0)),
            Rect::new(0.0, 0.0, 30.0, 30.0),
            Size::new(1200.0, 800.0),
        );
        assert_eq!(projector.scale(), 1.0);
    }

    #[test]
    fn large_content_fits_inside_padding() {
        let projector = MiniMapProjector::new(
            &config(),
            Some(Rect::new(0.0, 0.0, 2000.0, 400.0)),
            Rect::new(0.0, 0.0, 1200.0, 800.0),
            Size::new(1200.0, 800.0),
        );
        // content is 2020 x 820 after padding
        assert!((projector.scale() - 160.0 / 2020.0).abs() < 1e-6);
        let top_left = projector.to_overview(Point::new(-10.0, -10.0));
        assert!((top_left.x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn overview_mapping_round_trips() {
        let projector = MiniMapProjector::new(
            &config(),
            Some(Rect::new(-300.0, 100.0, 900.0, 500.0)),
            Rect::new(0.0, 0.0, 1200.0, 800.0),
            Size::new(1200.0, 800.0),
        );
        let model = Point::new(250.0, 410.0);
        let back = projector.to_model(projector.to_overview(model));
        assert!(back.distance(model) < 1e-2);
    }

    #[test]
    fn empty_graph_uses_surface() {
        let projector =
            MiniMapProjector::new(&config(), None, Rect::new(500.0, 500.0, 10.0, 10.0), Size::new(1600.0, 800.0));
        assert!((projector.scale() - 160.0 / 1620.0).abs() < 1e-6);
    }

    #[test]
    fn click_centers_view_on_point() {
        let mut view = ViewTransform::default();
        let projector = MiniMapProjector::new(
            &config(),
            Some(Rect::new(0.0, 0.0, 3000.0, 2000.0)),
            view.viewbox(),
            view.surface(),
        );
        let target = projector.to_overview(Point::new(2000.0, 1500.0));
        projector.click(&mut view, target);
        assert!(view.viewbox().center().distance(Point::new(2000.0, 1500.0)) < 0.5);
    }

    #[test]
    fn viewport_drag_only_starts_on_indicator() {
        let view = ViewTransform::default();
        let projector = MiniMapProjector::new(
            &config(),
            Some(Rect::new(0.0, 0.0, 3000.0, 2000.0)),
            view.viewbox(),
            view.surface(),
        );
        let inside = projector.to_overview(Point::new(10.0, 10.0));
        let outside = projector.to_overview(Point::new(2500.0, 1800.0));
        assert!(MiniMapDrag::begin(projector, view.viewbox(), inside).is_some());
        assert!(MiniMapDrag::begin(projector, view.viewbox(), outside).is_none());
    }

    #[test]
    fn off_center_grab_does_not_jump() {
        let mut view = ViewTransform::default();
        let projector = MiniMapProjector::new(
            &config(),
            Some(Rect::new(0.0, 0.0, 3000.0, 2000.0)),
            view.viewbox(),
            view.surface(),
        );
        let before = view.viewbox().center();
        let corner = projector.to_overview(Point::new(20.0, 20.0));
        let drag = MiniMapDrag::begin(projector, view.viewbox(), corner).unwrap();

        drag.drag_to(&mut view, corner);
        assert!(view.viewbox().center().distance(before) < 0.01);

        drag.drag_to(&mut view, corner.offset(10.0, 5.0));
        let moved = view.viewbox().center();
        let expected = before.offset(10.0 / projector.scale(), 5.0 / projector.scale());
        assert!(moved.distance(expected) < 0.5);
    }
}
