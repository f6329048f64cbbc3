extern crate linalloc;

use linalloc::{Allocator, Config};

fn main() {
    let mut heap = Allocator::with_config(Config::growable(0, 16 << 20));

    let a = heap.allocate(30);
    let b = heap.allocate_aligned(64, 500);

    assert_eq!(a % 8, 0);
    assert_eq!(b % 64, 0);

    heap.memory_mut().fill(a, 30, 0x22);
    for (i, byte) in heap.memory_mut().slice_mut(b, 500).iter_mut().enumerate() {
        *byte = i as u8;
    }

    assert_eq!(heap.memory().slice(a, 30)[5], 0x22);
    assert_eq!(heap.memory().slice(b, 500)[15], 15);

    let a = heap.reallocate(a, 300);
    assert_eq!(heap.memory().slice(a, 30), &[0x22; 30][..]);

    heap.deallocate(a);
    heap.deallocate(b);

    println!("{}", heap.stats());
}
