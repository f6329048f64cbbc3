//! Configuration.
//!
//! This module contains anything which can be tweaked and customized to the users preferences.

use core::{cmp, fmt};

/// The growth granularity.
///
/// Growth requests are rounded up to a multiple of this, matching the page size of linear
/// memory hosts.
pub const GRANULARITY: u32 = 64 * 1024;

/// The page size of a growable host.
pub const PAGE_SIZE: u32 = 64 * 1024;

/// The default trim threshold.
///
/// Whenever the top chunk grows past this after a deallocation, the allocator will try to give
/// the unused tail back to the program break.
pub const DEFAULT_TRIM_THRESHOLD: u32 = 2 * 1024 * 1024;

/// The default size of linear memory.
pub const DEFAULT_INITIAL_MEMORY: u32 = 16 * 1024 * 1024;

/// The default size of the static area below the heap.
///
/// Nothing in here is ever handed out, which keeps offset zero free for the failure sentinel.
pub const DEFAULT_STATIC_RESERVE: u32 = 1024;

/// The minimum log level.
pub const MIN_LOG_LEVEL: u8 = 0;

/// The size of the buffer fatal messages are formatted into.
pub const LOG_BUFFER_SIZE: usize = 256;

/// The file descriptor fatal messages are written to.
pub const LOG_TARGET: i32 = 2;

/// The default OOM handler.
#[cold]
pub fn default_oom_handler() -> ! {
    // Log some message.
    log(6, format_args!("\x1b[31;1mThe application ran out of memory. Aborting.\x1b[m"));

    crate::abort()
}

/// The default misuse handler.
///
/// Called when an offset that was never handed out (or was already freed) is given back.
#[cold]
pub fn default_misuse_handler(ptr: u32) -> ! {
    log(6, format_args!("\x1b[31;1mInvalid or freed heap offset 0x{:x}. Aborting.\x1b[m", ptr));

    crate::abort()
}

/// Write to the log.
///
/// This points to stderr, but could be changed arbitrarily.
pub fn log(lv: u8, args: fmt::Arguments) {
    crate::log::write(lv, "linalloc", args, file!(), line!());
}

/// Canonicalize a fresh allocation.
///
/// Growing linear memory is expensive for the host, which is why we would rather acquire more
/// memory than necessary, than having many growths acquiring memory stubs.
///
/// The return value specifies how much _more_ space is requested.
#[inline]
pub fn extra_brk(size: u32) -> u32 {
    /// The growth multiplier.
    ///
    /// The factor determining the linear dependence between the minimum segment, and the acquired
    /// segment.
    const MULTIPLIER: u32 = 2;
    /// The minimum extra size to be grown.
    const MIN_EXTRA: u32 = 1024;
    /// The maximal amount of _extra_ bytes.
    const MAX_EXTRA: u32 = 4 * 1024 * 1024;

    cmp::max(MIN_EXTRA, cmp::min(MULTIPLIER.saturating_mul(size), MAX_EXTRA))
}
