//! # Guard Overhead Benchmark
//!
//! Cost of one guarded access: side-storage lookup, start transition, end
//! transition.
//!
//! Run with: `cargo bench --package racewatch_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use racewatch_core::{
    AccessState, BoundedStorage, ObjectId, Registry, Reporter, ShardedStorage, SideStorage,
    ThreadTag, ViolationPolicy,
};

/// Number of tracked objects in the lookup benchmarks.
const TRACKED_OBJECTS: u32 = 10_000;

fn populated<S: SideStorage>(storage: S) -> Registry<S> {
    let registry = Registry::new(storage, Reporter::for_policy(ViolationPolicy::Record));
    for index in 0..TRACKED_OBJECTS {
        let _ = registry.track(ObjectId::new(index, 0));
    }
    registry
}

/// Benchmark: bare transitions on one state, no lookup.
fn bench_transitions(c: &mut Criterion) {
    let state = AccessState::new();
    let me = ThreadTag::current();

    c.bench_function("read_transition_pair", |b| {
        b.iter(|| {
            state.read_started(black_box(me), |_| {});
            state.read_ended();
        });
    });

    c.bench_function("write_transition_pair", |b| {
        b.iter(|| {
            state.write_started(black_box(me), |_| {});
            state.write_ended();
        });
    });
}

/// Benchmark: full guarded access through each backend.
fn bench_scoped_guards(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_read");

    let sharded = populated(ShardedStorage::new());
    group.bench_with_input(BenchmarkId::from_parameter("sharded"), &sharded, |b, registry| {
        let mut index = 0;
        b.iter(|| {
            index = (index + 1) % TRACKED_OBJECTS;
            let _guard = registry.scoped_read(black_box(ObjectId::new(index, 0)));
        });
    });

    let bounded = populated(BoundedStorage::new(TRACKED_OBJECTS as usize));
    group.bench_with_input(BenchmarkId::from_parameter("bounded"), &bounded, |b, registry| {
        let mut index = 0;
        b.iter(|| {
            index = (index + 1) % TRACKED_OBJECTS;
            let _guard = registry.scoped_read(black_box(ObjectId::new(index, 0)));
        });
    });

    group.finish();
}

/// Benchmark: guarded reads while three other threads hammer the same object.
fn bench_contended_reads(c: &mut Criterion) {
    let registry = Arc::new(populated(ShardedStorage::new()));
    let id = ObjectId::new(0, 0);
    let stop = Arc::new(AtomicBool::new(false));

    let background: Vec<_> = (0..3)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let _guard = registry.scoped_read(id);
                }
            })
        })
        .collect();

    c.bench_function("scoped_read_contended_3_readers", |b| {
        b.iter(|| {
            let _guard = registry.scoped_read(black_box(id));
        });
    });

    stop.store(true, Ordering::Relaxed);
    for handle in background {
        let _ = handle.join();
    }
}

criterion_group!(
    benches,
    bench_transitions,
    bench_scoped_guards,
    bench_contended_reads,
);
criterion_main!(benches);
