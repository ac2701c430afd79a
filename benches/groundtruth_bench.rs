//! Benchmarks for ground-truth fingerprinting and computation.
//!
//! Run with: cargo bench --bench groundtruth_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forge_recall::dataset::{synthetic, SyntheticSpec};
use forge_recall::{GroundTruthCache, GroundTruthComputer, Metric};
use tempfile::TempDir;

/// Benchmark cache key computation across corpus sizes.
fn benchmark_compute_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_key");

    for n in [1_000, 10_000, 100_000] {
        let ds = synthetic::generate(&SyntheticSpec::new(n, 128, 100)).unwrap();
        let bytes = (ds.vectors().len() + ds.queries().len()) * 4;
        group.throughput(Throughput::Bytes(bytes as u64));

        group.bench_with_input(BenchmarkId::from_parameter(n), &ds, |b, ds| {
            b.iter(|| {
                GroundTruthCache::compute_key(
                    black_box(ds.vectors()),
                    black_box(ds.queries()),
                    128,
                    10,
                    Metric::L2,
                )
            })
        });
    }

    group.finish();
}

/// Compare a cold exhaustive computation against a cache hit.
fn benchmark_compute_vs_hit(c: &mut Criterion) {
    let ds = synthetic::generate(&SyntheticSpec::new(10_000, 128, 100)).unwrap();
    let mut group = c.benchmark_group("ground_truth_10k");
    group.sample_size(10);

    group.bench_function("exhaustive", |b| {
        b.iter_with_setup(
            || {
                let dir = TempDir::new().unwrap();
                let computer = GroundTruthComputer::new(GroundTruthCache::new(dir.path()));
                (dir, computer)
            },
            |(_dir, computer)| {
                computer
                    .compute(ds.vectors(), ds.queries(), ds.d(), 10, Metric::L2)
                    .unwrap()
            },
        )
    });

    let dir = TempDir::new().unwrap();
    let computer = GroundTruthComputer::new(GroundTruthCache::new(dir.path()));
    computer
        .compute(ds.vectors(), ds.queries(), ds.d(), 10, Metric::L2)
        .unwrap();

    group.bench_function("cache_hit", |b| {
        b.iter(|| {
            computer
                .compute(black_box(ds.vectors()), ds.queries(), ds.d(), 10, Metric::L2)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_compute_key, benchmark_compute_vs_hit);
criterion_main!(benches);
