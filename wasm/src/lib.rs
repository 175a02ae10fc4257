use panorama_canvas::editor::Editor;
use panorama_canvas::geometry::{Point, Size};
use panorama_canvas::input::{Key, KeyInput, Modifiers, PointerButton, PointerInput, WheelInput};
use panorama_canvas::layout::LayoutAlgorithm;
use panorama_canvas::model::Project;
use panorama_canvas::render::render_editor_svg;
use panorama_canvas::{Config, parse_config};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

fn js_error(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn config_from(config_json: Option<String>) -> Result<Config, JsValue> {
    match config_json {
        Some(raw) => parse_config(&raw).map_err(|error| JsValue::from_str(&format!("{error:#}"))),
        None => Ok(Config::default()),
    }
}

fn algorithm_from(name: &str) -> Result<LayoutAlgorithm, JsValue> {
    LayoutAlgorithm::from_token(name).ok_or_else(|| js_error(format!("unknown layout `{name}`")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PointerEvent {
    x: f32,
    y: f32,
    button: u8,
    shift_key: bool,
    ctrl_key: bool,
    meta_key: bool,
    alt_key: bool,
    delta_x: f32,
    delta_y: f32,
    key: String,
}

impl PointerEvent {
    fn parse(raw: &str) -> Result<Self, JsValue> {
        serde_json::from_str(raw).map_err(js_error)
    }

    fn modifiers(&self) -> Modifiers {
        Modifiers {
            shift: self.shift_key,
            ctrl: self.ctrl_key,
            meta: self.meta_key,
            alt: self.alt_key,
        }
    }

    fn pointer(&self) -> PointerInput {
        let button = match self.button {
            1 => PointerButton::Middle,
            2 => PointerButton::Secondary,
            _ => PointerButton::Primary,
        };
        PointerInput::primary(self.x, self.y)
            .with_button(button)
            .with_modifiers(self.modifiers())
    }

    fn key(&self) -> Option<KeyInput> {
        let key = match self.key.as_str() {
            "Delete" => Key::Delete,
            "Backspace" => Key::Backspace,
            "Escape" => Key::Escape,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return None,
                }
            }
        };
        Some(KeyInput {
            key,
            modifiers: self.modifiers(),
        })
    }
}

/// One open diagram driven by DOM events serialized as JSON.
#[wasm_bindgen]
pub struct CanvasEditor {
    inner: Editor,
}

#[wasm_bindgen]
impl CanvasEditor {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<CanvasEditor, JsValue> {
        Ok(Self {
            inner: Editor::new(config_from(config_json)?),
        })
    }

    #[wasm_bindgen(js_name = loadProject)]
    pub fn load_project(&mut self, project_json: &str) -> Result<String, JsValue> {
        let project = Project::from_json(project_json, "Untitled").map_err(js_error)?;
        let report = self.inner.load(project);
        serde_json::to_string(report).map_err(js_error)
    }

    #[wasm_bindgen(js_name = setSurface)]
    pub fn set_surface(&mut self, left: f32, top: f32, width: f32, height: f32) {
        self.inner
            .view_mut()
            .set_surface(Point::new(left, top), Size::new(width, height));
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, event_json: &str) -> Result<(), JsValue> {
        let event = PointerEvent::parse(event_json)?;
        self.inner.pointer_down(event.pointer()).map_err(js_error)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.inner.pointer_move(Point::new(x, y));
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: f32, y: f32) -> Result<bool, JsValue> {
        self.inner.pointer_up(Point::new(x, y)).map_err(js_error)
    }

    #[wasm_bindgen(js_name = doubleClick)]
    pub fn double_click(&mut self, x: f32, y: f32) -> bool {
        self.inner.double_click(Point::new(x, y))
    }

    pub fn wheel(&mut self, event_json: &str) -> Result<(), JsValue> {
        let event = PointerEvent::parse(event_json)?;
        self.inner.wheel(WheelInput {
            screen: Point::new(event.x, event.y),
            delta_x: event.delta_x,
            delta_y: event.delta_y,
            modifiers: event.modifiers(),
        });
        Ok(())
    }

    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&mut self, event_json: &str) -> Result<bool, JsValue> {
        let event = PointerEvent::parse(event_json)?;
        match event.key() {
            Some(key) => self.inner.key_down(key).map_err(js_error),
            None => Ok(false),
        }
    }

    #[wasm_bindgen(js_name = applyLayout)]
    pub fn apply_layout(&mut self, algorithm: &str) -> Result<String, JsValue> {
        let result = self.inner.apply_layout(algorithm_from(algorithm)?);
        serde_json::to_string(&result).map_err(js_error)
    }

    #[wasm_bindgen(js_name = drillDown)]
    pub fn drill_down(&mut self, id: &str) -> bool {
        self.inner.drill_down(id)
    }

    #[wasm_bindgen(js_name = goToLevel)]
    pub fn go_to_level(&mut self, level: usize) {
        self.inner.go_to_level(level);
    }

    pub fn breadcrumb(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.breadcrumb()).map_err(js_error)
    }

    pub fn undo(&mut self) -> bool {
        self.inner.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.inner.redo()
    }

    #[wasm_bindgen(js_name = isDirty)]
    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    pub fn minimap(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.minimap()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = renderSvg)]
    pub fn render_svg(&self) -> String {
        render_editor_svg(&self.inner)
    }

    #[wasm_bindgen(js_name = projectJson)]
    pub fn project_json(&self) -> Result<String, JsValue> {
        let project = self
            .inner
            .to_project()
            .ok_or_else(|| js_error("no project is open"))?;
        serde_json::to_string(&project).map_err(js_error)
    }
}

/// Loads `project_json`, runs one layout pass and returns the positions.
#[wasm_bindgen]
pub fn layout_project_json(
    project_json: &str,
    algorithm: &str,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    let mut editor = Editor::new(config_from(config_json)?);
    editor.load(Project::from_json(project_json, "Untitled").map_err(js_error)?);
    let result = editor.apply_layout(algorithm_from(algorithm)?);
    serde_json::to_string(&result).map_err(js_error)
}

#[wasm_bindgen]
pub fn render_project_svg(project_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let mut editor = Editor::new(config_from(config_json)?);
    editor.load(Project::from_json(project_json, "Untitled").map_err(js_error)?);
    Ok(render_editor_svg(&editor))
}
