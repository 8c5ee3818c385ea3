//! Throughput of the two paths that matter for the content cache: a
//! repeated hit against a warm entry, and a miss-driven eviction loop.

use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hss::cache::ContentCache;

fn bench_cache_hit(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warm.html");
    std::fs::File::create(&path).unwrap().write_all(&[b'x'; 4096]).unwrap();
    let path = path.to_str().unwrap().to_string();
    let cache = ContentCache::new(1 << 20);
    cache.acquire(&path).unwrap(); // prime

    c.bench_function("cache_acquire_hit", |b| {
        b.iter(|| {
            let handle = cache.acquire(black_box(&path)).unwrap();
            black_box(handle.bytes().len());
        })
    });
}

fn bench_cache_miss_with_eviction(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..64 {
        let path = dir.path().join(format!("f{i}.html"));
        std::fs::File::create(path).unwrap().write_all(&[b'x'; 4096]).unwrap();
    }
    // small enough that every acquire evicts the previous entry
    let cache = ContentCache::new(8192);

    c.bench_function("cache_acquire_miss_with_eviction", |b| {
        b.iter(|| {
            for i in 0..64 {
                let path = dir.path().join(format!("f{i}.html"));
                let handle = cache.acquire(black_box(path.to_str().unwrap())).unwrap();
                black_box(handle.bytes().len());
            }
        })
    });
}

criterion_group!(benches, bench_cache_hit, bench_cache_miss_with_eviction);
criterion_main!(benches);
