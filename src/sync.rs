//! Synchronization primitives.
//!
//! An allocator is single-threaded: every operation takes `&mut self`. Where several threads
//! genuinely need the same heap, the whole allocator goes behind one lock.

use spin::{Mutex, MutexGuard};

use crate::allocator::Allocator;

/// An allocator shared between threads.
///
/// Every operation holds the lock for its whole duration, so they appear atomic to each other.
pub struct SharedAllocator {
    /// The inner allocator.
    inner: Mutex<Allocator>,
}

impl SharedAllocator {
    /// Share an allocator.
    pub const fn new(allocator: Allocator) -> SharedAllocator {
        SharedAllocator {
            inner: Mutex::new(allocator),
        }
    }

    /// Lock the allocator, for a sequence of operations that must not interleave with others.
    pub fn lock(&self) -> MutexGuard<'_, Allocator> {
        self.inner.lock()
    }

    /// Allocate `n` bytes, returning `0` on failure.
    pub fn allocate(&self, n: u32) -> u32 {
        self.lock().allocate(n)
    }

    /// Give back the allocation at `mem`.
    pub fn deallocate(&self, mem: u32) {
        self.lock().deallocate(mem)
    }

    /// Resize the allocation at `mem`, returning `0` on failure.
    pub fn reallocate(&self, mem: u32, n: u32) -> u32 {
        self.lock().reallocate(mem, n)
    }

    /// Take the allocator back.
    pub fn into_inner(self) -> Allocator {
        self.inner.into_inner()
    }
}
