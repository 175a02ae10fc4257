use serde::Serialize;

use crate::config::ViewConfig;
use crate::geometry::{Point, Rect, Size};
use crate::input::WheelInput;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PanDrag {
    start_screen: Point,
    start_pan: Point,
}

/// Pan/zoom state of the canvas.
///
/// `screen = origin + pan + model * zoom`, where `origin` is the top-left of the
/// drawing surface on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransform {
    zoom: f32,
    pan: Point,
    origin: Point,
    surface: Size,
    min_zoom: f32,
    max_zoom: f32,
    wheel_zoom_in: f32,
    wheel_zoom_out: f32,
    drag: Option<PanDrag>,
}

/// Serializable snapshot for hosts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub zoom: f32,
    pub pan: Point,
}

impl ViewTransform {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ZERO,
            origin: Point::ZERO,
            surface: Size::new(config.surface_width, config.surface_height),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            wheel_zoom_in: config.wheel_zoom_in,
            wheel_zoom_out: config.wheel_zoom_out,
            drag: None,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    pub fn state(&self) -> ViewState {
        ViewState {
            zoom: self.zoom,
            pan: self.pan,
        }
    }

    /// Where the drawing surface sits on screen and how big it is.
    pub fn set_surface(&mut self, origin: Point, size: Size) {
        self.origin = origin;
        if size.width > 0.0 && size.height > 0.0 {
            self.surface = size;
        }
    }

    pub fn screen_to_model(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.origin.x - self.pan.x) / self.zoom,
            (screen.y - self.origin.y - self.pan.y) / self.zoom,
        )
    }

    pub fn model_to_screen(&self, model: Point) -> Point {
        Point::new(
            model.x * self.zoom + self.pan.x + self.origin.x,
            model.y * self.zoom + self.pan.y + self.origin.y,
        )
    }

    /// Multiplies the zoom, clamped to the configured bounds. With an anchor
    /// the model point under it stays put.
    pub fn zoom_by(&mut self, factor: f32, anchor: Option<Point>) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let next = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        match anchor {
            Some(screen) => {
                let fixed = self.screen_to_model(screen);
                self.zoom = next;
                self.pan = Point::new(
                    screen.x - self.origin.x - fixed.x * next,
                    screen.y - self.origin.y - fixed.y * next,
                );
            }
            None => self.zoom = next,
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan = self.pan.offset(dx, dy);
    }

    pub fn pan_to(&mut self, x: f32, y: f32) {
        self.pan = Point::new(x, y);
    }

    /// Pans so `model` lands in the middle of the surface.
    pub fn center_on(&mut self, model: Point) {
        self.pan = Point::new(
            self.surface.width / 2.0 - model.x * self.zoom,
            self.surface.height / 2.0 - model.y * self.zoom,
        );
    }

    /// The model-space rect currently visible on the surface.
    pub fn viewbox(&self) -> Rect {
        let top_left = self.screen_to_model(self.origin);
        Rect::new(
            top_left.x,
            top_left.y,
            self.surface.width / self.zoom,
            self.surface.height / self.zoom,
        )
    }

    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = Point::ZERO;
        self.drag = None;
    }

    pub fn begin_pan(&mut self, screen: Point) {
        self.drag = Some(PanDrag {
            start_screen: screen,
            start_pan: self.pan,
        });
    }

    pub fn is_panning(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pan_drag_to(&mut self, screen: Point) {
        if let Some(drag) = self.drag {
            self.pan = drag
                .start_pan
                .offset(screen.x - drag.start_screen.x, screen.y - drag.start_screen.y);
        }
    }

    pub fn end_pan(&mut self) {
        self.drag = None;
    }

    /// Command-wheel zooms around the cursor, a plain wheel pans.
    pub fn handle_wheel(&mut self, wheel: WheelInput) {
        if wheel.modifiers.is_command() {
            let factor = if wheel.delta_y > 0.0 {
                self.wheel_zoom_out
            } else {
                self.wheel_zoom_in
            };
            self.zoom_by(factor, Some(wheel.screen));
        } else {
            self.pan_by(-wheel.delta_x, -wheel.delta_y);
        }
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(&ViewConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use proptest::prelude::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-2 && (a.y - b.y).abs() < 1e-2
    }

    #[test]
    fn accounts_for_surface_origin() {
        let mut view = ViewTransform::default();
        view.set_surface(Point::new(100.0, 50.0), Size::new(800.0, 600.0));
        view.pan_to(20.0, 10.0);
        view.set_zoom(2.0);
        assert_eq!(view.screen_to_model(Point::new(140.0, 80.0)), Point::new(10.0, 10.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = ViewTransform::default();
        for _ in 0..100 {
            view.zoom_by(1.5, None);
        }
        assert_eq!(view.zoom(), 3.0);
        for _ in 0..100 {
            view.zoom_by(0.5, None);
        }
        assert_eq!(view.zoom(), 0.3);
    }

    #[test]
    fn anchored_zoom_keeps_point_under_cursor() {
        let mut view = ViewTransform::default();
        view.pan_to(40.0, -30.0);
        let cursor = Point::new(300.0, 200.0);
        let before = view.screen_to_model(cursor);
        view.zoom_by(1.8, Some(cursor));
        assert!(close(view.screen_to_model(cursor), before));
    }

    #[test]
    fn wheel_pans_or_zooms() {
        let mut view = ViewTransform::default();
        let wheel = WheelInput {
            screen: Point::new(10.0, 10.0),
            delta_x: 5.0,
            delta_y: 20.0,
            modifiers: Modifiers::NONE,
        };
        view.handle_wheel(wheel);
        assert_eq!(view.pan(), Point::new(-5.0, -20.0));
        assert_eq!(view.zoom(), 1.0);

        view.handle_wheel(WheelInput {
            modifiers: Modifiers::command(),
            ..wheel
        });
        assert!((view.zoom() - 0.95).abs() < 1e-6);
        view.handle_wheel(WheelInput {
            delta_y: -20.0,
            modifiers: Modifiers::command(),
            ..wheel
        });
        assert!((view.zoom() - 0.9975).abs() < 1e-5);
    }

    #[test]
    fn pan_drag_tracks_pointer() {
        let mut view = ViewTransform::default();
        view.pan_to(10.0, 10.0);
        view.begin_pan(Point::new(100.0, 100.0));
        view.pan_drag_to(Point::new(130.0, 90.0));
        assert_eq!(view.pan(), Point::new(40.0, 0.0));
        view.end_pan();
        view.pan_drag_to(Point::new(0.0, 0.0));
        assert_eq!(view.pan(), Point::new(40.0, 0.0));
    }

    #[test]
    fn center_on_and_viewbox_agree() {
        let mut view = ViewTransform::default();
        view.set_zoom(2.0);
        view.center_on(Point::new(500.0, 300.0));
        let viewbox = view.viewbox();
        assert!(close(viewbox.center(), Point::new(500.0, 300.0)));
        assert_eq!(viewbox.width, 600.0);
    }

    proptest! {
        #[test]
        fn screen_model_round_trip(
            zoom in 0.3f32..3.0,
            pan_x in -2000.0f32..2000.0,
            pan_y in -2000.0f32..2000.0,
            origin_x in 0.0f32..400.0,
            x in -5000.0f32..5000.0,
            y in -5000.0f32..5000.0,
        ) {
            let mut view = ViewTransform::default();
            view.set_surface(Point::new(origin_x, 12.0), Size::new(1024.0, 768.0));
            view.set_zoom(zoom);
            view.pan_to(pan_x, pan_y);
            let p = Point::new(x, y);
            let back = view.screen_to_model(view.model_to_screen(p));
            prop_assert!((back.x - p.x).abs() <= 1e-2 * (1.0 + p.x.abs() / 1000.0));
            prop_assert!((back.y - p.y).abs() <= 1e-2 * (1.0 + p.y.abs() / 1000.0));
        }
    }
}
