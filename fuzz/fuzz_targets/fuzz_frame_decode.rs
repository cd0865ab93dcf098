#![no_main]

use libfuzzer_sys::fuzz_target;
use pumlview_core::ImageStage;
use pumlview_core::protocol::{InboundFrame, decode_frame};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Decoding must never panic.
    let Ok(frame) = decode_frame(text) else {
        return;
    };

    // A decoded diagram either starts a load or raises the error indicator.
    if let InboundFrame::Diagram(payload) = frame {
        assert!(!payload.filename.trim().is_empty());
        let mut stage = ImageStage::default();
        match stage.present(&payload) {
            Ok(ticket) => assert!(!ticket.src.is_empty(), "empty image source from {text:?}"),
            Err(_) => assert!(stage.error_indicator().is_some()),
        }
    }
});
