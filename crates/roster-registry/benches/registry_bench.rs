// Benchmarks for registry store performance
// Measures register, renew, lookup and sweep candidate collection

use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use roster_registry::{InstanceRecord, InstanceRegistration, RegistryStore};

const TTL: Duration = Duration::from_secs(90);

fn record(service: &str, id: &str, now_ms: i64) -> InstanceRecord {
    InstanceRegistration::new(service, id, "10.0.0.1", 8080).into_record(now_ms, TTL)
}

fn populated_store(services: usize, per_service: usize) -> RegistryStore {
    let store = RegistryStore::new();
    for s in 0..services {
        for i in 0..per_service {
            store.register(record(&format!("service-{}", s), &format!("inst-{}", i), 0));
        }
    }
    store
}

fn bench_register(c: &mut Criterion) {
    let store = RegistryStore::new();
    let mut counter = 0u64;

    c.bench_function("register_instance", |b| {
        b.iter(|| {
            counter += 1;
            let id = format!("inst-{}", counter % 10_000);
            store.register(black_box(record("bench-service", &id, 0)))
        })
    });
}

fn bench_renew(c: &mut Criterion) {
    let store = populated_store(10, 100);

    c.bench_function("renew_instance", |b| {
        b.iter(|| {
            store.renew(
                black_box("service-5"),
                black_box("inst-50"),
                black_box(1_000),
                true,
            )
        })
    });
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for per_service in [10, 100, 1000] {
        let store = populated_store(10, per_service);
        group.bench_with_input(
            BenchmarkId::from_parameter(per_service),
            &per_service,
            |b, _| b.iter(|| store.lookup(black_box("service-3"))),
        );
    }

    group.finish();
}

fn bench_expired_candidates(c: &mut Criterion) {
    let store = populated_store(100, 100);

    c.bench_function("expired_candidates_10k", |b| {
        b.iter(|| store.expired_candidates(black_box(100_000)))
    });
}

criterion_group!(
    benches,
    bench_register,
    bench_renew,
    bench_lookup,
    bench_expired_candidates
);
criterion_main!(benches);
