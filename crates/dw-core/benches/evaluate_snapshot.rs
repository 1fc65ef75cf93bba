//! Criterion benchmarks for the retention evaluators.
//!
//! Snapshots are synthetic so the benchmarks never need a Docker daemon.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dw_common::{ContainerId, ContainerRecord, ContainerState, ImageId, ImageRecord};
use dw_config::RetentionPolicy;
use dw_core::evaluate::{evaluate_containers, evaluate_images};
use dw_core::inventory::{ContainerSnapshot, ImageSnapshot};

const NOW: i64 = 1_700_000_000;

/// A layered inventory: every fourth image is tagged, the rest are
/// intermediate layers chained to their predecessor.
fn images(n: usize) -> Vec<ImageRecord> {
    (0..n)
        .map(|i| ImageRecord {
            id: ImageId::new(format!("sha256:{:08x}", i)),
            created_at: Some(NOW - (i as i64 * 3_600)),
            parent_id: (i % 4 != 0).then(|| ImageId::new(format!("sha256:{:08x}", i - 1))),
            repo_tags: if i % 4 == 0 {
                vec![format!("app{}:v{}", i % 17, i)]
            } else {
                Vec::new()
            },
            containers: None,
            size: 50_000_000,
        })
        .collect()
}

fn containers(n: usize) -> Vec<ContainerRecord> {
    (0..n)
        .map(|i| {
            let state = if i % 3 == 0 {
                ContainerState::Running
            } else {
                ContainerState::Exited
            };
            ContainerRecord {
                id: ContainerId::new(format!("{:012x}", i)),
                status: state.to_string(),
                state,
                names: vec![format!("/svc-{}", i)],
                image_id: ImageId::new(format!("sha256:{:08x}", (i * 4) % 512)),
                finished_at: Some(NOW - (i as i64 * 7_200)),
                size_rw: Some(4096),
            }
        })
        .collect()
}

fn bench_evaluate_images(c: &mut Criterion) {
    let policy = RetentionPolicy::default()
        .keep_image("app3")
        .keep_image("app5:v20");
    let mut group = c.benchmark_group("evaluate_images");

    for n in [64usize, 512, 4096] {
        let snapshot = ImageSnapshot::from_records(images(n), &containers(n / 8));
        group.bench_with_input(BenchmarkId::from_parameter(n), &snapshot, |b, snap| {
            b.iter(|| {
                let decisions = evaluate_images(black_box(snap), &policy, NOW);
                black_box(decisions);
            });
        });
    }
    group.finish();
}

fn bench_evaluate_containers(c: &mut Criterion) {
    let policy = RetentionPolicy::default()
        .keep_container("svc-1")
        .keep_container("svc-10");
    let snapshot = ContainerSnapshot::from_records(containers(1024));

    c.bench_function("evaluate_containers/1024", |b| {
        b.iter(|| {
            let decisions = evaluate_containers(black_box(&snapshot), &policy, NOW);
            black_box(decisions);
        })
    });
}

fn bench_index_build(c: &mut Criterion) {
    let raw = images(4096);
    let refs = containers(512);
    c.bench_function("image_snapshot/from_records/4096", |b| {
        b.iter(|| {
            let snapshot = ImageSnapshot::from_records(black_box(raw.clone()), &refs);
            black_box(snapshot);
        })
    });
}

criterion_group!(
    benches,
    bench_evaluate_images,
    bench_evaluate_containers,
    bench_index_build
);
criterion_main!(benches);
