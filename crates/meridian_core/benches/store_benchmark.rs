//! # Store Benchmark
//!
//! Spawn throughput, bitmap queries, and field writes at replication scale.
//!
//! Run with: `cargo bench --package meridian_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meridian_core::{ComponentKind, Filter, Position, Store, Velocity};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ENTITY_COUNT: usize = 10_000;

fn populated(count: usize) -> Store {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut store = Store::new(count);
    for _ in 0..count {
        let Ok(e) = store.spawn() else { break };
        store.add(e, ComponentKind::Sync, None);
        store.insert(e, Position::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)));
        if rng.gen_bool(0.5) {
            store.insert(e, Velocity::new(1.0, 0.0));
        }
    }
    store
}

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");
    for count in [1_000, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut store = Store::new(64);
                for _ in 0..count {
                    black_box(store.spawn().ok());
                }
                store.len()
            });
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let store = populated(ENTITY_COUNT);
    let filter = Filter::all(&[ComponentKind::Sync, ComponentKind::Position])
        .with(&[ComponentKind::Velocity])
        .without(&[ComponentKind::Projectile]);
    c.bench_function("query_10k", |b| {
        b.iter(|| black_box(store.query(&filter)).len());
    });
}

fn bench_integrate(c: &mut Criterion) {
    let mut store = populated(ENTITY_COUNT);
    let movers = store.query_kinds(&[ComponentKind::Position, ComponentKind::Velocity]);
    c.bench_function("integrate_10k", |b| {
        b.iter(|| {
            for &e in &movers {
                let (Some(p), Some(v)) = (store.get_as::<Position>(e), store.get_as::<Velocity>(e)) else {
                    continue;
                };
                store.set_as(e, Position::new(p.x + v.x * 0.016, p.y + v.y * 0.016));
            }
            store.flush();
        });
    });
}

criterion_group!(benches, bench_spawn, bench_query, bench_integrate);
criterion_main!(benches);
