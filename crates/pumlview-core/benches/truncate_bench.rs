//! Benchmarks for filename truncation.
//!
//! Run with: cargo bench -p pumlview-core --bench truncate_bench
//!
//! Workloads:
//! - **fits**: label already fits; one measurement.
//! - **narrow**: deep path into a small container; binary search over suffixes.
//! - **deferred**: request + animation-frame cycle through `FilenameDisplay`.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pumlview_core::filename::{CellMeasure, ELLIPSIS, FilenameDisplay};
use pumlview_core::truncate_filename;
use std::hint::black_box;

const MONO: CellMeasure = CellMeasure::new(7.0);

fn deep_path(depth: usize) -> String {
    let mut path = String::new();
    for i in 0..depth {
        path.push_str(&format!("/segment_{i:02}"));
    }
    path.push_str("/some_component.puml");
    path
}

fn bench_truncate(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate_filename");

    for depth in [2usize, 8, 32] {
        let path = deep_path(depth);
        group.bench_with_input(BenchmarkId::new("fits", depth), &path, |b, path| {
            b.iter(|| truncate_filename(black_box(path), 1e6, ELLIPSIS, &MONO));
        });
        group.bench_with_input(BenchmarkId::new("narrow", depth), &path, |b, path| {
            b.iter(|| truncate_filename(black_box(path), black_box(180.0), ELLIPSIS, &MONO));
        });
    }

    group.finish();
}

fn bench_deferred(c: &mut Criterion) {
    let path = deep_path(8);
    c.bench_function("filename_display/deferred_cycle", |b| {
        let mut display = FilenameDisplay::default();
        b.iter(|| {
            display.request_deferred();
            display.request_deferred();
            black_box(display.on_animation_frame(&path, Some(400.0), &MONO).map(str::len))
        });
    });
}

criterion_group!(benches, bench_truncate, bench_deferred);
criterion_main!(benches);
