extern crate linalloc;

mod util;

use linalloc::{Allocator, Config};

#[test]
fn foreign_brk() {
    util::setup();

    let mut heap = Allocator::with_config(Config::growable(0, 64 << 20));

    let before = heap.allocate_bytes(b"hello from the outside.");
    let top = heap.stats().top_size;

    // Someone else claims memory behind the heap.
    let foreign = heap.memory_mut().sbrk(12).unwrap();
    heap.memory_mut().write_u32(foreign, 0xdead_beef);
    heap.memory_mut().write_u32(foreign + 8, 99999);

    // Too big for the old top chunk, so the heap continues past the foreign block.
    let bx = heap.allocate(top + 100);
    assert!(bx > foreign);
    util::scribble(&mut heap, bx, top + 100, 3);

    assert_eq!(heap.stats().segments, 2);
    assert_eq!(heap.memory().read_u32(foreign), 0xdead_beef);
    assert_eq!(heap.memory().read_u32(foreign + 8), 99999);
    assert_eq!(heap.memory().slice(before, 23), b"hello from the outside.");
    heap.check();

    // The retired top chunk is still in use for smaller requests.
    let small = heap.allocate(100);
    assert!(small < foreign);
    heap.deallocate(small);
    heap.deallocate(bx);
    heap.deallocate(before);
    heap.check();
}

#[test]
fn contiguous_growth() {
    util::setup();

    let mut heap = Allocator::with_config(Config::growable(0, 64 << 20));

    let mut live = Vec::new();
    for i in 0..64 {
        let mem = heap.allocate(100_000);
        assert_ne!(mem, 0);
        util::scribble(&mut heap, mem, 100_000, i);
        live.push(mem);
    }

    // Nobody else moved the break, so it is all one segment.
    assert_eq!(heap.stats().segments, 1);
    for (i, &mem) in live.iter().enumerate() {
        assert!(util::intact(&heap, mem, 100_000, i as u8));
    }
    heap.check();
}

#[test]
fn ceiling() {
    util::setup();

    let mut heap = Allocator::with_config(Config::growable(0, 1 << 20));

    assert_eq!(heap.allocate(2 << 20), 0);
    let mem = heap.allocate(512 * 1024);
    assert_ne!(mem, 0);
    assert!(heap.memory().len() <= 1 << 20);
}

#[test]
fn auto_trim() {
    util::setup();

    let mut heap = Allocator::with_config(Config::growable(0, 64 << 20));

    let mem = heap.allocate(4 << 20);
    let footprint = heap.stats().footprint;
    let brk = heap.memory().brk();

    // The top chunk passes the trim threshold.
    heap.deallocate(mem);

    assert!(heap.stats().footprint < footprint);
    assert!(heap.memory().brk() < brk);
    assert_eq!(heap.stats().max_footprint, footprint);

    // And the heap grows back just fine.
    assert_ne!(heap.allocate(4 << 20), 0);
    heap.check();
}

#[test]
fn manual_trim() {
    util::setup();

    let mut heap = Allocator::with_config(Config {
        trim_threshold: u32::MAX,
        ..Config::growable(0, 64 << 20)
    });

    let mem = heap.allocate(1 << 20);
    heap.deallocate(mem);
    let footprint = heap.stats().footprint;

    // Keep some room.
    assert!(heap.trim(256 * 1024));
    assert!(heap.stats().top_size >= 256 * 1024);
    assert!(heap.stats().footprint < footprint);
    assert!(!heap.trim(256 * 1024));
    heap.check();
}

#[test]
fn trim_blocked_by_foreign_brk() {
    util::setup();

    let mut heap = Allocator::with_config(Config {
        trim_threshold: u32::MAX,
        ..Config::growable(0, 64 << 20)
    });

    let mem = heap.allocate(1 << 20);
    heap.deallocate(mem);
    heap.memory_mut().sbrk(8).unwrap();

    // The break no longer ends at the heap.
    assert!(!heap.trim(0));
    heap.check();
}
