#![cfg(target_arch = "wasm32")]
#![forbid(unsafe_code)]

use js_sys::Reflect;
use pumlview_web::PumlViewerWeb;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::wasm_bindgen_test;

fn get(value: &JsValue, key: &str) -> JsValue {
    Reflect::get(value, &JsValue::from_str(key)).unwrap()
}

#[wasm_bindgen_test]
fn start_requests_transport() {
    let mut viewer = PumlViewerWeb::new("").unwrap();
    let step = viewer.start();
    let commands = js_sys::Array::from(&get(&step, "commands"));
    assert_eq!(commands.length(), 1);
    assert_eq!(
        get(&commands.get(0), "kind").as_string().as_deref(),
        Some("open_transport")
    );
}

#[wasm_bindgen_test]
fn truncation_is_exposed() {
    let viewer = PumlViewerWeb::new("").unwrap();
    assert_eq!(viewer.truncate_filename("a.puml", 1_000.0), "a.puml");
    let short = viewer.truncate_filename("/very/long/path/to/diagram.puml", 100.0);
    assert!(short.starts_with("..."));
}

#[wasm_bindgen_test]
fn introspection_reports_threshold() {
    let viewer = PumlViewerWeb::new(r#"{"click_threshold_px": 8.0}"#).unwrap();
    let state = viewer.introspect();
    assert_eq!(get(&state, "click_threshold").as_f64(), Some(8.0));
    assert_eq!(get(&state, "connected").as_bool(), Some(false));
}
