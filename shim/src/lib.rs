//! Symbols and constants that `linalloc` depends on.
//!
//! This crate provides the tweakable configuration of the allocator, together with the few host
//! primitives (writing to stderr, aborting) the fatal paths need. None of them allocate.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod log;

/// Abort the process.
///
/// This never unwinds, as unwinding may itself need the heap that just failed.
#[cold]
#[cfg(unix)]
pub fn abort() -> ! {
    unsafe {
        // LAST AUDIT: 2026-10-19.

        // `abort` takes no arguments and never returns.
        libc::abort()
    }
}

/// Abort the process.
///
/// Without libc there is no abort primitive, so we fall back to panicking.
#[cold]
#[cfg(not(unix))]
pub fn abort() -> ! {
    panic!("linalloc: aborting");
}
