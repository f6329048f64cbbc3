//! The allocator.
//!
//! This is the public face of the heap: it owns linear memory and the bookkeeper, converts between
//! payload offsets and chunks, and applies the failure policies.

use alloc::boxed::Box;
use core::cmp;

use crate::bk::Bookkeeper;
use crate::chunk::{request2size, Chunk, ALIGNMENT, MAX_REQUEST, OVERHEAD};
use crate::config::Config;
use crate::error::AllocError;
use crate::fail::{Handlers, MisuseHandler, OomHandler};
use crate::memory::LinearMemory;
use crate::stats::Stats;
use crate::sys::Host;

/// Are offsets given back checked for being live allocations?
const GUARDED: bool = cfg!(any(debug_assertions, feature = "security"));

/// A heap over its own linear memory.
///
/// Offsets handed out are 8-byte aligned, never `0`, and stay valid until given back, even when
/// linear memory grows. `0` is the failure sentinel.
pub struct Allocator {
    /// The linear memory the heap lives in.
    memory: LinearMemory,
    /// The bookkeeper.
    bk: Bookkeeper,
    /// The configuration.
    config: Config,
    /// The OOM and misuse handlers.
    handlers: Handlers,
}

impl Allocator {
    /// Create an allocator over fixed-capacity linear memory.
    pub fn new(capacity: u32) -> Allocator {
        Allocator::with_config(Config::fixed(capacity))
    }

    /// Create an allocator from a configuration.
    pub fn with_config(config: Config) -> Allocator {
        let host = config.host();
        Allocator::with_host(config, host)
    }

    /// Create an allocator growing its memory through a custom host.
    ///
    /// `config.maximum_memory` is ignored; the host decides.
    pub fn with_host(config: Config, host: Box<dyn Host>) -> Allocator {
        Allocator {
            memory: LinearMemory::new(config.initial_memory, config.static_reserve, host),
            bk: Bookkeeper::new(config.trim_threshold),
            config,
            handlers: Handlers::default(),
        }
    }

    /// The configuration of this allocator.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The linear memory the heap lives in.
    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// Mutable access to linear memory.
    ///
    /// Writing outside live allocations corrupts the heap. Moving the program break is fine.
    pub fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    /// Set the OOM handler.
    ///
    /// This is only called when `abort_on_oom` is set.
    pub fn set_oom_handler(&mut self, handler: OomHandler) {
        log!(NOTE, "Setting the OOM handler.");

        self.handlers.oom = handler;
    }

    /// Set the misuse handler.
    ///
    /// This is only called in debug builds, or with the `security` feature.
    pub fn set_misuse_handler(&mut self, handler: MisuseHandler) {
        log!(NOTE, "Setting the misuse handler.");

        self.handlers.misuse = handler;
    }

    /// Allocate `n` bytes.
    ///
    /// The returned offset is 8-byte aligned.
    pub fn try_allocate(&mut self, n: u32) -> Result<u32, AllocError> {
        if n >= MAX_REQUEST {
            return Err(self.failed(AllocError::TooLarge(n)));
        }

        match self.bk.malloc(&mut self.memory, request2size(n)) {
            Ok(p) => {
                log!(DEBUG, "Allocated {} bytes at 0x{:x}.", n, p.to_mem());

                Ok(p.to_mem())
            }
            Err(err) => Err(self.failed(err)),
        }
    }

    /// Allocate `n` bytes, returning `0` on failure.
    pub fn allocate(&mut self, n: u32) -> u32 {
        self.try_allocate(n).unwrap_or(0)
    }

    /// Give back the allocation at `mem`.
    ///
    /// `0` is ignored. Anything else must be a live allocation of this allocator; in debug builds
    /// (or with the `security` feature) other offsets call the misuse handler, otherwise the heap
    /// is silently corrupted.
    pub fn deallocate(&mut self, mem: u32) {
        if mem == 0 {
            return;
        }

        log!(DEBUG, "Deallocating 0x{:x}.", mem);

        let p = self.chunk_of(mem);

        #[cfg(feature = "security")]
        {
            let len = p.size(&self.memory) - OVERHEAD;
            self.memory.fill(mem, len, 0);
        }

        self.bk.free(&mut self.memory, p);
    }

    /// Resize the allocation at `mem` to `n` bytes.
    ///
    /// The allocation is resized in place if possible, and moved otherwise. `0` allocates fresh,
    /// and `n == 0` frees the allocation, returning `0`. On failure, the allocation is left
    /// untouched.
    pub fn try_reallocate(&mut self, mem: u32, n: u32) -> Result<u32, AllocError> {
        if mem == 0 {
            return self.try_allocate(n);
        }
        if n == 0 {
            self.deallocate(mem);
            return Ok(0);
        }
        if n >= MAX_REQUEST {
            return Err(self.failed(AllocError::TooLarge(n)));
        }

        let p = self.chunk_of(mem);
        if self.bk.try_realloc_chunk(&mut self.memory, p, request2size(n)) {
            log!(DEBUG, "Resized 0x{:x} to {} bytes in place.", mem, n);

            return Ok(mem);
        }

        let new = self.try_allocate(n)?;
        let len = cmp::min(p.size(&self.memory) - OVERHEAD, n);
        self.memory.copy_within(mem, new, len);
        self.deallocate(mem);

        log!(DEBUG, "Moved 0x{:x} to 0x{:x} ({} bytes).", mem, new, n);

        Ok(new)
    }

    /// Resize the allocation at `mem` to `n` bytes, returning `0` on failure.
    pub fn reallocate(&mut self, mem: u32, n: u32) -> u32 {
        self.try_reallocate(mem, n).unwrap_or(0)
    }

    /// Allocate `count * size` zeroed bytes, returning `0` on failure or overflow.
    pub fn allocate_zeroed(&mut self, count: u32, size: u32) -> u32 {
        let n = match count.checked_mul(size) {
            Some(n) => n,
            None => {
                self.failed(AllocError::TooLarge(u32::MAX));
                return 0;
            }
        };

        let mem = self.allocate(n);
        if mem != 0 {
            self.memory.fill(mem, n, 0);
        }

        mem
    }

    /// Allocate `n` bytes aligned to `alignment`, returning `0` on failure.
    ///
    /// Alignments that are not powers of two are rounded up to one.
    pub fn allocate_aligned(&mut self, alignment: u32, n: u32) -> u32 {
        if alignment <= ALIGNMENT {
            return self.allocate(n);
        }

        let alignment = match alignment.checked_next_power_of_two() {
            Some(alignment) if n < MAX_REQUEST - alignment => alignment,
            _ => {
                self.failed(AllocError::TooLarge(n));
                return 0;
            }
        };

        match self.bk.memalign(&mut self.memory, alignment, request2size(n)) {
            Ok(p) => p.to_mem(),
            Err(err) => {
                self.failed(err);
                0
            }
        }
    }

    /// Copy `bytes` into a fresh allocation, returning `0` on failure.
    pub fn allocate_bytes(&mut self, bytes: &[u8]) -> u32 {
        let n = match u32::try_from(bytes.len()) {
            Ok(n) => n,
            Err(_) => {
                self.failed(AllocError::TooLarge(u32::MAX));
                return 0;
            }
        };

        let mem = self.allocate(n);
        if mem != 0 {
            self.memory.slice_mut(mem, n).copy_from_slice(bytes);
        }

        mem
    }

    /// The number of bytes usable at `mem`, which may exceed what was asked for.
    pub fn usable_size(&self, mem: u32) -> u32 {
        if mem == 0 {
            return 0;
        }

        self.chunk_of(mem).size(&self.memory) - OVERHEAD
    }

    /// Give unused memory at the end of the heap back to the program break, keeping at least
    /// `pad` bytes free.
    ///
    /// Returns whether anything was released.
    pub fn trim(&mut self, pad: u32) -> bool {
        self.bk.sys_trim(&mut self.memory, pad)
    }

    /// Gather statistics about the heap.
    pub fn stats(&self) -> Stats {
        self.bk.stats(&self.memory)
    }

    /// Check the consistency of the heap.
    ///
    /// With debug assertions, this panics if any bin, boundary tag or segment is off. Without,
    /// it does nothing.
    pub fn check(&self) {
        self.bk.check_malloc_state(&self.memory);
    }

    /// The chunk of the live allocation at `mem`.
    fn chunk_of(&self, mem: u32) -> Chunk {
        if GUARDED && !self.bk.owns(&self.memory, mem) {
            self.handlers.misuse(mem);
        }

        Chunk::from_mem(mem)
    }

    /// Apply the failure policy to an error.
    fn failed(&self, err: AllocError) -> AllocError {
        log!(WARNING, "Allocation failed: {}.", err);

        if err.is_oom() && self.config.abort_on_oom {
            self.handlers.oom();
        }

        err
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sentinel() {
        let mut a = Allocator::new(4096);

        assert_eq!(a.allocate(1 << 20), 0);
        assert_eq!(a.try_allocate(MAX_REQUEST), Err(AllocError::TooLarge(MAX_REQUEST)));
        assert!(matches!(a.try_allocate(1 << 20), Err(AllocError::Grow(_))));
        assert_ne!(a.allocate(16), 0);
    }

    #[test]
    fn test_usable_size() {
        let mut a = Allocator::new(4096);

        assert_eq!(a.usable_size(0), 0);
        let mem = a.allocate(1);
        assert_eq!(a.usable_size(mem), 8);
        let mem = a.allocate(100);
        assert_eq!(a.usable_size(mem), 104);
    }

    #[test]
    #[should_panic(expected = "oom")]
    fn test_abort_on_oom() {
        fn panic() -> ! {
            panic!("oom");
        }

        let mut a = Allocator::with_config(Config {
            abort_on_oom: true,
            ..Config::fixed(4096)
        });
        a.set_oom_handler(panic);

        a.allocate(8192);
    }

    #[test]
    fn test_too_large_never_aborts() {
        fn panic() -> ! {
            panic!("oom");
        }

        let mut a = Allocator::with_config(Config {
            abort_on_oom: true,
            ..Config::fixed(4096)
        });
        a.set_oom_handler(panic);

        assert_eq!(a.allocate(u32::MAX), 0);
        assert_eq!(a.allocate_zeroed(1 << 16, 1 << 16), 0);
    }
}
