//! Criterion benchmarks for the hexflow simulation engine.
//!
//! - `belt_field`: many producer -> belt chains, measures routing and belt phases
//! - `adder_line`: the smallest full chain including a transformer and receiver
//! - `serialization`: snapshot encode and decode of a large belt field

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use hexflow_core::engine::Engine;
use hexflow_core::test_utils::*;

/// Step until every belt is saturated so the benchmark sees steady state.
fn warmed(mut engine: Engine) -> Engine {
    run(&mut engine, 50);
    engine
}

fn bench_belt_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("belt_field");
    group.sample_size(30);

    for rows in [100, 1_000] {
        let mut engine = warmed(belt_field(rows));
        group.bench_function(format!("{rows}_chains_6_belts"), |b| {
            b.iter(|| {
                engine.step();
            });
        });
    }

    group.finish();
}

fn bench_adder_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("adder_line");
    group.sample_size(50);

    let mut line = adder_line();
    run(&mut line.engine, 20);

    group.bench_function("step", |b| {
        b.iter(|| {
            line.engine.step();
        });
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    group.sample_size(30);

    let engine = warmed(belt_field(1_000));

    group.bench_function("serialize_1000_chains", |b| {
        b.iter(|| {
            engine.serialize().unwrap();
        });
    });

    let data = engine.serialize().unwrap();
    group.bench_function("deserialize_1000_chains", |b| {
        b.iter(|| {
            Engine::deserialize(&data).unwrap();
        });
    });

    group.bench_function("state_hash_after_step", |b| {
        b.iter_batched(
            || engine_copy(&data),
            |mut e| {
                e.step();
                e.state_hash()
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn engine_copy(data: &[u8]) -> Engine {
    Engine::deserialize(data).unwrap()
}

criterion_group!(benches, bench_belt_field, bench_adder_line, bench_serialization);
criterion_main!(benches);
