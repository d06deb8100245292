use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use aura_record::ProductSnapshot;
use aura_storage::{CachePolicy, EventBus, ListCache, MemoryOrigin};

fn cache(origin: &MemoryOrigin, policy: CachePolicy) -> ListCache {
    let bus = EventBus::new();
    ListCache::new(Arc::new(origin.attach(&bus)), Arc::new(bus), policy)
}

fn bench_add_recently_viewed(c: &mut Criterion) {
    c.bench_function("recently_viewed_add_1k", |b| {
        b.iter(|| {
            let origin = MemoryOrigin::new();
            let cache = cache(&origin, CachePolicy::recently_viewed());
            for i in 0..1_000 {
                black_box(cache.add_product(ProductSnapshot::new(
                    format!("produto-{}", i % 40),
                    "Produto",
                )));
            }
        })
    });
}

fn bench_get_full_list(c: &mut Criterion) {
    let origin = MemoryOrigin::new();
    let cache = cache(&origin, CachePolicy::recently_viewed());
    for i in 0..20 {
        cache.add_product(ProductSnapshot::new(format!("produto-{i}"), "Produto"));
    }

    c.bench_function("recently_viewed_get_20", |b| {
        b.iter(|| black_box(cache.get()))
    });
}

fn bench_comparison_toggle(c: &mut Criterion) {
    c.bench_function("comparison_toggle_1k", |b| {
        b.iter(|| {
            let origin = MemoryOrigin::new();
            let cache = cache(&origin, CachePolicy::comparison());
            for i in 0..1_000 {
                let handle = format!("produto-{}", i % 6);
                if cache.is_member(&handle) {
                    black_box(cache.remove(&handle));
                } else {
                    black_box(cache.add_product(ProductSnapshot::new(handle, "Produto")));
                }
            }
        })
    });
}

criterion_group!(
    benches,
    bench_add_recently_viewed,
    bench_get_full_list,
    bench_comparison_toggle,
);
criterion_main!(benches);
