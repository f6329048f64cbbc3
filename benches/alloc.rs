//! Allocator benchmarks

use linalloc::{Allocator, Config, SharedAllocator};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Allocate, grow and free the same block over and over.
fn alloc_realloc_free(heap: &mut Allocator) {
    for _ in 0..1000 {
        let a = heap.allocate(200);
        let a = heap.reallocate(a, 300);
        heap.deallocate(a);
    }
}

/// Many small allocations, followed by one large resize.
fn many_small(heap: &mut Allocator) {
    let mut stuff = Vec::with_capacity(1000);

    for i in 0..1000 {
        stuff.push(heap.allocate(8 + i % 64));
    }

    let big = heap.allocate(1000 * 8);
    let big = heap.reallocate(big, 100_000 * 8);

    for mem in stuff {
        heap.deallocate(mem);
    }
    heap.deallocate(big);
}

/// Interleaved sizes spanning the small and tree bins.
fn mixed(heap: &mut Allocator) {
    let mut live = Vec::with_capacity(64);

    for i in 0..2000u32 {
        live.push(heap.allocate((i * 7919) % 4096));
        if i % 3 == 0 {
            let mem = live.swap_remove((i as usize * 31) % live.len());
            heap.deallocate(mem);
        }
    }

    for mem in live {
        heap.deallocate(mem);
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut heap = Allocator::with_config(Config::growable(0, 256 << 20));
    c.bench_function("alloc_realloc_free", |b| b.iter(|| alloc_realloc_free(&mut heap)));
    c.bench_function("many_small", |b| b.iter(|| many_small(&mut heap)));
    c.bench_function("mixed", |b| b.iter(|| mixed(&mut heap)));

    c.bench_function("aligned", |b| {
        b.iter(|| {
            let mem = heap.allocate_aligned(black_box(64), black_box(200));
            heap.deallocate(mem);
        })
    });

    let mut trimming = Allocator::with_config(Config {
        trim_threshold: 64 * 1024,
        ..Config::growable(0, 256 << 20)
    });
    c.bench_function("grow_and_trim", |b| {
        b.iter(|| {
            let mem = trimming.allocate(black_box(1 << 20));
            trimming.deallocate(mem);
        })
    });

    let shared = SharedAllocator::new(Allocator::with_config(Config::growable(0, 256 << 20)));
    c.bench_function("shared", |b| {
        b.iter(|| {
            let mem = shared.allocate(black_box(200));
            shared.deallocate(mem);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
