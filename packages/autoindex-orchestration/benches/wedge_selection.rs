//! Benchmark for the selection and classification hot paths
//!
//! Measures:
//! - Wedge selection across sweep lengths and frame widths
//! - Diagnostic translation plus classification

use autoindex_orchestration::{select_wedges, ErrorClassifier, FailureReport, UnitCell};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark wedge selection
fn bench_select_wedges(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_wedges");

    for (num_images, phi_width) in [(20u32, 1.0), (360, 1.0), (3600, 0.1)].iter() {
        let images: Vec<u32> = (1..=*num_images).collect();

        group.bench_with_input(
            BenchmarkId::new(format!("width_{}", phi_width), num_images),
            &images,
            |b, images| {
                b.iter(|| {
                    let wedges = select_wedges(black_box(images), *phi_width, 5)
                        .expect("selection failed");
                    black_box(wedges);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark parsing and classifying an engine complaint
fn bench_classify(c: &mut Criterion) {
    let classifier = ErrorClassifier::default();
    let target = UnitCell::new([78.0, 78.0, 37.0, 90.0, 90.0, 90.0]).expect("valid cell");
    let proposed = UnitCell::new([78.3, 78.1, 37.1, 90.0, 90.0, 90.0]).expect("valid cell");

    c.bench_function("classify_insufficient_percentage", |b| {
        b.iter(|| {
            let report = FailureReport::from_diagnostic(black_box(
                "!!! ERROR !!! INSUFFICIENT PERCENTAGE (< 70%) OF INDEXED REFLECTIONS",
            ))
            .with_proposed_cell(proposed);
            black_box(classifier.classify(&report, Some(&target)));
        });
    });
}

criterion_group!(benches, bench_select_wedges, bench_classify);
criterion_main!(benches);
