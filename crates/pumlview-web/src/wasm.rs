#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the browser viewer.
//!
//! JavaScript owns the WebSocket, the retry timer, `requestAnimationFrame`
//! and the `<img>` element. It forwards each browser event to
//! [`PumlViewerWeb`], executes the returned commands, and applies the returned
//! DOM patches. Only compiled on `wasm32` targets.

use js_sys::{Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;
use web_time::{SystemTime, UNIX_EPOCH};

use pumlview_core::{
    CellMeasure, HostCommand, PointerButton, SurfaceSnapshot, TextMeasure, Viewer, ViewerConfig,
};

use crate::surface::diff;

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

fn set_js(obj: &Object, key: &str, value: JsValue) {
    let _ = Reflect::set(obj, &JsValue::from_str(key), &value);
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Serialize through JSON so JS receives plain objects.
fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    match serde_json::to_string(value) {
        Ok(json) => js_sys::JSON::parse(&json).unwrap_or(JsValue::NULL),
        Err(err) => {
            console_error(&format!("pumlview: serialize failed: {err}"));
            JsValue::NULL
        }
    }
}

/// `NaN`, zero and negative widths mean "no layout yet".
fn width_from_js(width: f64) -> Option<f64> {
    (width.is_finite() && width > 0.0).then_some(width)
}

/// Text metrics from a 2D canvas context whose `font` matches the label.
struct CanvasMeasure {
    context: CanvasRenderingContext2d,
}

impl TextMeasure for CanvasMeasure {
    fn measure(&self, text: &str) -> Option<f64> {
        let width = self.context.measure_text(text).ok()?.width();
        width.is_finite().then_some(width)
    }
}

/// Browser-facing viewer.
#[wasm_bindgen]
pub struct PumlViewerWeb {
    inner: Viewer,
    painted: Option<SurfaceSnapshot>,
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
}

impl PumlViewerWeb {
    /// Commands plus the patches they caused, as `{ commands, patches }`.
    fn step(&mut self, commands: Vec<HostCommand>) -> JsValue {
        let next = self.inner.snapshot();
        let patches = diff(self.painted.as_ref(), &next);
        self.painted = Some(next);
        let out = Object::new();
        set_js(&out, "commands", to_js(&commands));
        set_js(&out, "patches", to_js(&patches));
        out.into()
    }
}

#[wasm_bindgen]
impl PumlViewerWeb {
    /// Create a viewer from a JSON config (`""` for defaults).
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<PumlViewerWeb, JsValue> {
        install_panic_hook();
        let config = if config_json.trim().is_empty() {
            ViewerConfig::default()
        } else {
            ViewerConfig::from_json_str(config_json)
                .map_err(|err| JsValue::from_str(&err.to_string()))?
        };
        // Until a canvas is attached, approximate a 12px monospace font.
        let inner = Viewer::new(config, Box::new(CellMeasure::new(7.0)))
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(Self {
            inner,
            painted: None,
        })
    }

    /// Measure filename text with this canvas context from now on.
    #[wasm_bindgen(js_name = setMeasureContext)]
    pub fn set_measure_context(&mut self, context: CanvasRenderingContext2d) {
        self.inner.set_measure(Box::new(CanvasMeasure { context }));
    }

    pub fn start(&mut self) -> JsValue {
        let commands = self.inner.start(now_ms());
        self.step(commands)
    }

    #[wasm_bindgen(js_name = transportOpened)]
    pub fn transport_opened(&mut self) -> JsValue {
        let commands = self.inner.transport_opened(now_ms());
        self.step(commands)
    }

    #[wasm_bindgen(js_name = transportMessage)]
    pub fn transport_message(&mut self, text: &str) -> JsValue {
        let commands = self.inner.transport_message(now_ms(), text);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = transportClosed)]
    pub fn transport_closed(&mut self, code: u16, clean: bool, reason: &str) -> JsValue {
        let commands = self.inner.transport_closed(now_ms(), code, clean, reason);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = transportError)]
    pub fn transport_error(&mut self, reason: &str) -> JsValue {
        let commands = self.inner.transport_error(now_ms(), reason);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = retryTimerElapsed)]
    pub fn retry_timer_elapsed(&mut self) -> JsValue {
        let commands = self.inner.retry_timer_elapsed(now_ms());
        self.step(commands)
    }

    /// `generation` travels through JS as a double; loads never get near 2^53.
    #[wasm_bindgen(js_name = imageLoaded)]
    pub fn image_loaded(&mut self, generation: f64) -> JsValue {
        let commands = self.inner.image_loaded(generation as u64);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = imageFailed)]
    pub fn image_failed(&mut self, generation: f64, reason: &str) -> JsValue {
        let commands = self.inner.image_failed(generation as u64, reason);
        self.step(commands)
    }

    /// Animation-frame callback. Pass the container's current `clientWidth`.
    #[wasm_bindgen(js_name = animationFrame)]
    pub fn animation_frame(&mut self, container_width: f64) -> JsValue {
        self.inner.animation_frame(&width_from_js(container_width));
        self.step(Vec::new())
    }

    #[wasm_bindgen(js_name = containerResized)]
    pub fn container_resized(&mut self) -> JsValue {
        let commands = self.inner.container_resized();
        self.step(commands)
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, pointer_id: i32, button: i16, x: f64, y: f64) -> JsValue {
        let commands = self
            .inner
            .pointer_down(pointer_id, PointerButton::from_dom(button), x, y);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, pointer_id: i32, x: f64, y: f64) -> JsValue {
        let commands = self.inner.pointer_move(pointer_id, x, y);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, pointer_id: i32, x: f64, y: f64) -> JsValue {
        let commands = self.inner.pointer_up(pointer_id, x, y);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = pointerCancel)]
    pub fn pointer_cancel(&mut self, pointer_id: i32) -> JsValue {
        let commands = self.inner.pointer_cancel(pointer_id);
        self.step(commands)
    }

    #[wasm_bindgen(js_name = startNewSession)]
    pub fn start_new_session(&mut self) -> JsValue {
        let commands = self.inner.start_new_session();
        self.step(commands)
    }

    /// Recompute the filename label now, against the given width.
    #[wasm_bindgen(js_name = renderFilenameImmediate)]
    pub fn render_filename_immediate(&mut self, container_width: f64) -> String {
        self.inner
            .render_filename_immediate(&width_from_js(container_width))
    }

    /// Pure truncation helper, exposed for page scripts and tests.
    #[wasm_bindgen(js_name = truncateFilename)]
    pub fn truncate_filename(&self, filename: &str, max_width: f64) -> String {
        self.inner.truncate(filename, max_width)
    }

    /// Full surface snapshot, for repainting from scratch.
    pub fn snapshot(&self) -> JsValue {
        to_js(&self.inner.snapshot())
    }

    /// Flags and numbers for automation (`window.__pumlview` in the page).
    pub fn introspect(&self) -> JsValue {
        to_js(&self.inner.introspect())
    }
}
