#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pumlview_core::{CellMeasure, HostCommand, PointerButton, Viewer, ViewerConfig};

#[derive(Debug, Arbitrary)]
enum Step {
    Start,
    Opened,
    Message(String),
    Update { filename: String, url: bool },
    Closed { code: u16, clean: bool },
    Error,
    RetryTimer,
    LoadOk,
    LoadFailed,
    Frame(Option<f64>),
    Resized,
    Down { id: i32, button: i16, x: f64, y: f64 },
    Move { id: i32, x: f64, y: f64 },
    Up { id: i32, x: f64, y: f64 },
    Cancel(i32),
    NewSession,
}

fuzz_target!(|steps: Vec<Step>| {
    let Ok(mut viewer) = Viewer::new(ViewerConfig::default(), Box::new(CellMeasure::new(7.0)))
    else {
        return;
    };
    let mut now = 0u64;
    let mut loads: Vec<u64> = Vec::new();

    for step in steps.into_iter().take(512) {
        now += 1;
        let commands = match step {
            Step::Start => viewer.start(now),
            Step::Opened => viewer.transport_opened(now),
            Step::Message(text) => viewer.transport_message(now, &text),
            Step::Update { filename, url } => {
                let frame = serde_json::json!({
                    "type": "update",
                    "filename": filename,
                    "url": if url { Some("/render.png") } else { None },
                    "image": if url { None } else { Some("iVBORw0KGgo=") },
                });
                viewer.transport_message(now, &frame.to_string())
            }
            Step::Closed { code, clean } => viewer.transport_closed(now, code, clean, ""),
            Step::Error => viewer.transport_error(now, "fuzz"),
            Step::RetryTimer => viewer.retry_timer_elapsed(now),
            Step::LoadOk => loads.pop().map(|g| viewer.image_loaded(g)).unwrap_or_default(),
            Step::LoadFailed => loads
                .pop()
                .map(|g| viewer.image_failed(g, "fuzz"))
                .unwrap_or_default(),
            Step::Frame(width) => {
                viewer.animation_frame(&width);
                Vec::new()
            }
            Step::Resized => viewer.container_resized(),
            Step::Down { id, button, x, y } => {
                viewer.pointer_down(id, PointerButton::from_dom(button), x, y)
            }
            Step::Move { id, x, y } => viewer.pointer_move(id, x, y),
            Step::Up { id, x, y } => viewer.pointer_up(id, x, y),
            Step::Cancel(id) => viewer.pointer_cancel(id),
            Step::NewSession => viewer.start_new_session(),
        };
        for command in commands {
            if let HostCommand::LoadImage { generation, .. } = command {
                loads.push(generation);
            }
        }

        let state = viewer.introspect();
        let snap = viewer.snapshot();
        assert!(state.pan_x.is_finite() && state.pan_y.is_finite());
        assert_eq!(snap.status_text == "Live", state.connected && state.has_loaded_diagram);
        assert!(!state.zoom_pan_mode || state.has_loaded_diagram);
        assert_ne!(snap.placeholder_visible, snap.image_visible);
    }
});
