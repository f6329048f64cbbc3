extern crate linalloc;

#[test]
fn minimal() {
    let mut heap = linalloc::Allocator::new(64 * 1024);

    let a = heap.allocate(1);
    let b = heap.allocate(2);
    let c = heap.allocate(3);

    assert!(a != 0 && b != 0 && c != 0);

    heap.deallocate(a);
    heap.deallocate(b);
    heap.deallocate(c);
    heap.check();
}
