//! Reactivity benchmarks.
//!
//! Measures:
//! - Reading a valid cache (the hot path)
//! - Recomputing a cache after a write
//! - Building and traversing ordering DAGs
//!
//! Run with: cargo bench --bench reactivity

use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glint_core::{Cache, Dag, DeferredContext, Runtime, Tracked, TrackedMap};

fn runtime() -> Runtime {
    let runtime = Runtime::new();
    runtime
        .set_global_context(Rc::new(DeferredContext::new()))
        .expect("fresh runtime has no context");
    runtime
}

fn benchmark_cache_reads(c: &mut Criterion) {
    let runtime = runtime();
    let _guard = runtime.enter();
    let mut group = c.benchmark_group("cache");

    for width in [1usize, 8, 64] {
        let fields: Rc<Vec<Tracked<u64>>> = Rc::new((0..width as u64).map(Tracked::new).collect());
        let cache = {
            let fields = fields.clone();
            Cache::new(move || fields.iter().map(Tracked::get).sum::<u64>())
        };
        cache.get();

        group.bench_with_input(BenchmarkId::new("valid_read", width), &cache, |b, cache| {
            b.iter(|| black_box(cache.get()))
        });

        group.bench_with_input(BenchmarkId::new("recompute", width), &cache, |b, cache| {
            b.iter(|| {
                fields[0].update(|value| *value += 1);
                black_box(cache.get())
            })
        });
    }

    group.finish();
}

fn benchmark_map_reads(c: &mut Criterion) {
    let runtime = runtime();
    let _guard = runtime.enter();

    let map = Rc::new(TrackedMap::from_entries((0..256u32).map(|k| (k, k))));
    let cache = {
        let map = map.clone();
        Cache::new(move || map.get(&7))
    };

    c.bench_function("map/unrelated_write", |b| {
        let mut value = 0;
        b.iter(|| {
            value += 1;
            map.set(100, value);
            black_box(cache.get())
        })
    });
}

fn chain(len: usize) -> Vec<String> {
    (0..len).map(|i| format!("unit-{i}")).collect()
}

fn benchmark_dag(c: &mut Criterion) {
    let mut group = c.benchmark_group("dag");

    for len in [16usize, 256] {
        let keys = chain(len);

        group.bench_with_input(BenchmarkId::new("build_chain", len), &keys, |b, keys| {
            b.iter(|| {
                let mut dag = Dag::new();
                // Reverse order exercises forward references and deep checks.
                for pair in keys.windows(2).rev() {
                    dag.add(&pair[0], (), &[pair[1].as_str()], &[]).ok();
                }
                black_box(dag.len())
            })
        });

        let mut dag = Dag::new();
        for pair in keys.windows(2) {
            dag.add(&pair[0], (), &[pair[1].as_str()], &[]).ok();
        }
        group.bench_with_input(BenchmarkId::new("topsort", len), &dag, |b, dag| {
            b.iter(|| black_box(dag.keys().len()))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_cache_reads, benchmark_map_reads, benchmark_dag);
criterion_main!(benches);
