use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use foliocache::{Cache, CacheConfig};

fn bench_cached_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_hit", |b| {
        let cache = Cache::with_config(CacheConfig::new().with_count_limit(1000));
        let data = vec![b'x'; 1024];

        for page in 0..100u32 {
            cache.set(page, data.clone());
        }

        let mut counter = 0u32;
        b.iter(|| {
            black_box(cache.get(&(counter % 100)));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_bounded_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_set");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_1kb_limit_5", |b| {
        // Page caches in the reader keep only a handful of rendered pages
        let cache = Cache::with_config(CacheConfig::new().with_count_limit(5));
        let data = vec![b'x'; 1024];

        let mut counter = 0u32;
        b.iter(|| {
            cache.set(counter, data.clone());
            counter = counter.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_mixed_50_50(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("50_read_50_write", |b| {
        let cache = Cache::with_config(CacheConfig::new().with_count_limit(64));
        let data = vec![b'x'; 1024];

        let mut counter = 0u32;
        b.iter(|| {
            let page = counter % 128;
            if counter % 2 == 0 {
                black_box(cache.get(&page));
            } else {
                cache.set(page, data.clone());
            }
            counter = counter.wrapping_add(1);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cached_get, bench_bounded_set, bench_mixed_50_50);
criterion_main!(benches);
