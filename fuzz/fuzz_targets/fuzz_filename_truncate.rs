#![no_main]

use libfuzzer_sys::fuzz_target;
use pumlview_core::filename::{CellMeasure, ELLIPSIS, TextMeasure};
use pumlview_core::truncate_filename;
use unicode_segmentation::UnicodeSegmentation;

const MONO: CellMeasure = CellMeasure::new(7.0);

fuzz_target!(|input: (String, f64)| {
    let (filename, width) = input;
    if filename.len() > 4096 {
        return;
    }

    let out = truncate_filename(&filename, width, ELLIPSIS, &MONO);
    if out == filename {
        return;
    }

    // Anything else is the ellipsis plus a grapheme-aligned proper suffix.
    let tail = out
        .strip_prefix(ELLIPSIS)
        .expect("truncated output starts with the ellipsis");
    assert!(filename.ends_with(tail));
    assert!(tail.len() < filename.len());
    let start = filename.len() - tail.len();
    assert!(
        tail.is_empty() || filename.grapheme_indices(true).any(|(i, _)| i == start),
        "suffix splits a grapheme at byte {start}"
    );

    let fits = MONO.measure(&out).is_some_and(|w| w <= width.max(0.0));
    assert!(fits || out == ELLIPSIS, "{out:?} overflows {width}");
});
