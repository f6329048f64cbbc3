//! **linalloc:** a boundary-tag allocator over linear memory.
//!
//! The heap lives inside a flat byte buffer standing in for a 32-bit address space, as a program
//! compiled to a linear-memory virtual machine sees it. Allocations are offsets into that buffer,
//! 8-byte aligned, with `0` as the failure sentinel.
//!
//! Free chunks are kept in exact-size small bins and best-fit trees, coalesced with their
//! neighbours through boundary tags, and carved from a top chunk that grows with the program
//! break. Linear memory is either fixed, or grown on demand through a [`Host`].
//!
//! ```
//! let mut heap = linalloc::Allocator::new(64 * 1024);
//!
//! let a = heap.allocate(100);
//! assert!(a != 0 && a % 8 == 0);
//!
//! heap.deallocate(a);
//! assert_eq!(heap.allocate(100), a);
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;
extern crate linalloc_shim as shim;

#[macro_use]
mod log;

mod allocator;
mod bk;
mod block;
mod brk;
mod chunk;
mod config;
mod memory;
mod stats;
mod sync;
pub mod error;
pub mod fail;
pub mod sys;

pub use crate::allocator::Allocator;
pub use crate::block::Block;
pub use crate::config::Config;
pub use crate::error::{AllocError, GrowError};
pub use crate::memory::LinearMemory;
pub use crate::stats::Stats;
pub use crate::sync::SharedAllocator;
pub use crate::sys::{Fixed, Growable, Host};
