//! Derivation read benchmarks.
//!
//! Measures a cached read, a read after a write to an input, and a full
//! call through a short interceptor chain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use trellis_core::{
    compose, Before, BundleDescriptor, DerivationDecl, Instance, InstanceConfig, Interceptor, MutationDecl,
    Signature, StateDecl, ValueKind,
};

/// A counter with a chain of `depth` derivations, each adding one to the
/// previous.
fn chained(depth: usize) -> Instance {
    let mut descriptor = BundleDescriptor::new("Chain")
        .state(StateDecl::new("counter").field("count", ValueKind::Number, json!(0)))
        .mutation(MutationDecl::new("increment", Signature::nullary(), |scope, _| {
            let count = scope.get("counter", "count")?.as_i64().unwrap_or(0) + 1;
            scope.set("counter", "count", json!(count))?;
            Ok(json!(count))
        }))
        .derivation(DerivationDecl::new("d0", ValueKind::Number, |scope| {
            Ok(scope.field("counter", "count")?)
        }));
    for level in 1..depth {
        let input = format!("d{}", level - 1);
        descriptor = descriptor.derivation(DerivationDecl::new(
            format!("d{level}"),
            ValueKind::Number,
            move |scope| Ok(json!(scope.read(&input)?.as_i64().unwrap_or(0) + 1)),
        ));
    }
    let bundle = descriptor.define().expect("chain bundle");
    compose([&bundle]).expect("compose").instantiate(InstanceConfig::default())
}

fn bench_cached_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_read");
    for depth in [1usize, 8, 32] {
        let instance = chained(depth);
        let last = format!("d{}", depth - 1);
        instance.read(&last).expect("warm");
        group.bench_with_input(BenchmarkId::from_parameter(depth), &last, |b, last| {
            b.iter(|| black_box(instance.read(last).expect("read")))
        });
    }
    group.finish();
}

fn bench_read_after_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_after_write");
    for depth in [1usize, 8, 32] {
        let instance = chained(depth);
        let last = format!("d{}", depth - 1);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &last, |b, last| {
            b.iter(|| {
                instance.call("increment", vec![]).expect("call");
                black_box(instance.read(last).expect("read"))
            })
        });
    }
    group.finish();
}

fn bench_intercepted_call(c: &mut Criterion) {
    let instance = chained(1);
    for _ in 0..4 {
        instance
            .add_hook(
                "increment",
                Interceptor::before(|_, args| Ok(Before::Continue(args))).and_after(|_, result, _| Ok(result)),
            )
            .expect("hook");
    }
    c.bench_function("intercepted_call", |b| {
        b.iter(|| black_box(instance.call("increment", vec![]).expect("call")))
    });
}

criterion_group!(benches, bench_cached_read, bench_read_after_write, bench_intercepted_call);
criterion_main!(benches);
