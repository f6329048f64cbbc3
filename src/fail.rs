//! General error handling.
//!
//! Every allocator carries its own handlers, so two allocators over different linear memories
//! can react differently to running dry.

use shim::config;

/// Called when memory cannot be grown and the allocator is configured to abort.
pub type OomHandler = fn() -> !;

/// Called with the offending offset when a foreign or already freed offset is given back.
pub type MisuseHandler = fn(u32) -> !;

/// The handlers of an allocator.
#[derive(Copy, Clone)]
pub struct Handlers {
    /// The OOM handler.
    pub oom: OomHandler,
    /// The misuse handler.
    pub misuse: MisuseHandler,
}

impl Default for Handlers {
    fn default() -> Handlers {
        Handlers {
            oom: config::default_oom_handler,
            misuse: config::default_misuse_handler,
        }
    }
}

impl Handlers {
    /// Call the OOM handler.
    ///
    /// This is used on out-of-memory errors, and will never return. Usually, it simply consists
    /// of aborting the process.
    ///
    /// # An important note
    ///
    /// This is for OOM-conditions, not malformed or too big allocations, but when the host is
    /// unable to give more memory for the allocation.
    #[cold]
    pub fn oom(&self) -> ! {
        log!(ERROR, "Out of memory, calling the OOM handler.");

        (self.oom)()
    }

    /// Call the misuse handler.
    #[cold]
    pub fn misuse(&self, ptr: u32) -> ! {
        log!(ERROR, "Offset 0x{:x} is not a live allocation.", ptr);

        (self.misuse)(ptr)
    }
}
