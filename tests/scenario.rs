extern crate linalloc;

mod util;

use linalloc::{Allocator, Config};

/// A growable heap that never trims, so growth shows in the footprint.
fn growable() -> Allocator {
    Allocator::with_config(Config {
        trim_threshold: u32::MAX,
        ..Config::growable(0, 64 << 20)
    })
}

#[test]
fn exact_fit_reuse() {
    util::setup();

    let mut heap = Allocator::new(64 * 1024);

    let a = heap.allocate(100);
    assert_ne!(a, 0);
    assert_eq!(a % 8, 0);

    let b = heap.allocate(100);
    assert!(b >= a + 108);

    heap.deallocate(a);
    assert_eq!(heap.allocate(100), a);
    heap.check();
}

#[test]
fn round_trip_without_growth() {
    util::setup();

    for &n in &[1, 7, 8, 100, 240, 241, 1000, 4096, 65536, 500_000] {
        let mut heap = growable();

        let mem = heap.allocate(n);
        assert_ne!(mem, 0);
        let footprint = heap.stats().footprint;

        heap.deallocate(mem);
        let mem = heap.allocate(n);

        assert_ne!(mem, 0);
        assert!(heap.usable_size(mem) >= n);
        assert_eq!(heap.stats().footprint, footprint, "Reallocating {} bytes grew the heap.", n);
        heap.check();
    }
}

#[test]
fn coalescing() {
    util::setup();

    for &(s1, s2) in &[(100, 200), (16, 16), (300, 5000), (240, 8)] {
        let mut heap = growable();

        let a = heap.allocate(s1);
        let b = heap.allocate(s2);
        // Keep them off the top chunk.
        let _guard = heap.allocate(16);
        let footprint = heap.stats().footprint;

        // The two chunks and the header between them.
        let merged = heap.usable_size(a) + heap.usable_size(b) + 8;
        heap.deallocate(a);
        heap.deallocate(b);

        assert_eq!(heap.allocate(merged), a);
        assert_eq!(heap.stats().footprint, footprint);
        heap.check();
    }
}

#[test]
fn small_bin_loop() {
    util::setup();

    let mut heap = growable();
    let first = heap.allocate(32);
    heap.deallocate(first);
    let footprint = heap.stats().footprint;

    for _ in 0..1000 {
        let mem = heap.allocate(32);
        assert_eq!(mem, first);
        heap.deallocate(mem);
    }

    assert_eq!(heap.stats().footprint, footprint);
    assert_eq!(heap.stats().max_footprint, footprint);
}

#[test]
fn exhaustion() {
    util::setup();

    let mut heap = Allocator::new(64 * 1024);

    let mut live = Vec::new();
    loop {
        let mem = heap.allocate(1000);
        if mem == 0 {
            break;
        }
        util::scribble(&mut heap, mem, 1000, live.len() as u8);
        live.push(mem);
    }

    assert!(live.len() >= 60);
    assert_eq!(heap.allocate(2000), 0);
    heap.check();

    // What is left still serves requests that fit.
    let top = heap.stats().top_size;
    if top > 24 {
        assert_ne!(heap.allocate(top - 16), 0);
    }

    // Freed space is reused.
    let victim = live.swap_remove(7);
    heap.deallocate(victim);
    assert_eq!(heap.allocate(1000), victim);

    for (seed, &mem) in live.iter().enumerate().filter(|&(i, _)| i != 7) {
        assert!(util::intact(&heap, mem, 1000, seed as u8));
    }
    heap.check();
}
