//! Test automation.

use linalloc::{Allocator, Config};

/// Set up logging, once.
#[allow(dead_code)]
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The kinds of heap every test should hold up on.
#[allow(dead_code)]
fn heaps() -> Vec<Allocator> {
    vec![
        // Fixed capacity.
        Allocator::new(4 << 20),
        // Growing from nothing.
        Allocator::with_config(Config::growable(0, 64 << 20)),
        // Growing, and trimming eagerly.
        Allocator::with_config(Config {
            trim_threshold: 64 * 1024,
            ..Config::growable(64 * 1024, 64 << 20)
        }),
    ]
}

/// "Multiply" a closure, by running it against several kinds of heap.
///
/// Every run is wrapped in acid, and the heap is checked for consistency afterwards.
#[allow(dead_code)]
pub fn multiply<F: Fn(&mut Allocator)>(func: F) {
    setup();

    for mut heap in heaps() {
        acid(&mut heap, |heap| func(heap));
        heap.check();
    }
}

/// Fill an allocation with a pattern derived from `seed`.
#[allow(dead_code)]
pub fn scribble(heap: &mut Allocator, mem: u32, len: u32, seed: u8) {
    for (i, b) in heap.memory_mut().slice_mut(mem, len).iter_mut().enumerate() {
        *b = seed ^ i as u8;
    }
}

/// Check the pattern written by `scribble`.
#[allow(dead_code)]
pub fn intact(heap: &Allocator, mem: u32, len: u32, seed: u8) -> bool {
    heap.memory()
        .slice(mem, len)
        .iter()
        .enumerate()
        .all(|(i, &b)| b == seed ^ i as u8)
}

/// Wrap a block in acid tests.
///
/// This performs a number of temporary allocations to try to detect inconsistency.
///
/// The basic idea is that if the allocator is broken, it might allocate the same memory twice, or
/// corrupt when allocating. Thus, we allocate some temporary allocations and fill them. This way we
/// might be able to detect memory corruption through asserting memory consistency after the
/// closure is completed.
#[allow(dead_code)]
pub fn acid<F: FnOnce(&mut Allocator)>(heap: &mut Allocator, func: F) {
    let mut scratch = Vec::new();

    for (seed, &len) in [3, 24, 100, 260, 1000, 4096].iter().enumerate() {
        let mem = heap.allocate(len);
        assert_ne!(mem, 0);
        scribble(heap, mem, len, seed as u8);
        scratch.push((mem, len, seed as u8));
    }

    // Free every other one, so the closure runs with some holes around.
    for &(mem, _, _) in scratch.iter().skip(1).step_by(2) {
        heap.deallocate(mem);
    }
    let mut scratch: Vec<_> = scratch.into_iter().step_by(2).collect();

    func(heap);

    let mem = heap.allocate(77);
    assert_ne!(mem, 0);
    scribble(heap, mem, 77, 0xaa);
    scratch.push((mem, 77, 0xaa));

    for &(mem, len, seed) in &scratch {
        assert!(intact(heap, mem, len, seed), "Scratch allocation 0x{:x} was overwritten.", mem);
    }
    for &(mem, _, _) in &scratch {
        heap.deallocate(mem);
    }
}
