//! Benchmark tests for LOB block framing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ojp_client::lob::family::{data_frames, start_frame};
use ojp_client::session::DatabaseFamily;

fn bench_generic_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("generic_family_framing");

    for size in [1024usize, 1024 * 64, 1024 * 1024] {
        let bytes = vec![0xABu8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("data_frames", size), &size, |b, _| {
            b.iter(|| black_box(data_frames(DatabaseFamily::Generic, &bytes, 0)));
        });
    }

    group.finish();
}

fn bench_h2_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("h2_family_framing");

    for size in [1024usize, 1024 * 64, 1024 * 1024] {
        let bytes = vec![0xABu8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("data_frames", size), &size, |b, _| {
            b.iter(|| black_box(data_frames(DatabaseFamily::H2, &bytes, 0)));
        });
    }

    group.finish();
}

fn bench_start_frame(c: &mut Criterion) {
    c.bench_function("start_frame_generic", |b| {
        b.iter(|| black_box(start_frame(DatabaseFamily::Generic, Vec::new())));
    });
}

criterion_group!(
    benches,
    bench_generic_framing,
    bench_h2_framing,
    bench_start_frame,
);
criterion_main!(benches);
