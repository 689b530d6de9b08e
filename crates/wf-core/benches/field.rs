//! Benchmarks for the hot learn/infer loop of the pattern field.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use wf_core::EmergentPatternField;

fn seeded_field(patterns: usize, dims: usize) -> EmergentPatternField {
    let mut field = EmergentPatternField::new();
    for p in 0..patterns {
        let signature: Vec<f64> = (0..dims)
            .map(|d| ((p * 31 + d * 7) % 97) as f64 / 97.0)
            .collect();
        field.learn(&format!("label{p}"), &signature, None);
    }
    field
}

fn bench_learn(c: &mut Criterion) {
    c.bench_function("learn_existing_label_64d", |b| {
        let mut field = seeded_field(50, 64);
        let probe: Vec<f64> = (0..64).map(|d| d as f64 / 64.0).collect();
        b.iter(|| field.learn(black_box("label7"), black_box(&probe), None));
    });
}

fn bench_infer(c: &mut Criterion) {
    c.bench_function("infer_50_patterns_64d", |b| {
        let field = seeded_field(50, 64);
        let probe: Vec<f64> = (0..64).map(|d| (d % 13) as f64 / 13.0).collect();
        b.iter(|| field.infer(black_box(&probe)));
    });

    c.bench_function("infer_500_patterns_64d", |b| {
        let field = seeded_field(500, 64);
        let probe: Vec<f64> = (0..64).map(|d| (d % 13) as f64 / 13.0).collect();
        b.iter(|| field.infer(black_box(&probe)));
    });
}

criterion_group!(benches, bench_learn, bench_infer);
criterion_main!(benches);
