//! Linear memory.
//!
//! The heap lives in a single flat byte buffer. Offsets into this buffer double as addresses;
//! offset zero is never handed out, since everything below the static reserve belongs to the
//! program, not the heap.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::{cmp, fmt};

use crate::error::GrowError;
use crate::sys::Host;

/// Round `x` up to a multiple of `align` (a power of two).
#[inline]
pub fn align_up(x: u32, align: u32) -> Option<u32> {
    x.checked_add(align - 1).map(|x| x & !(align - 1))
}

/// A contiguous, growable byte buffer standing in for the address space.
pub struct LinearMemory {
    /// The backing bytes.
    bytes: Vec<u8>,
    /// The program break.
    ///
    /// Everything below this is owned by someone (static data, the heap, foreign `sbrk` users),
    /// everything above it is unclaimed.
    pub(crate) brk: u32,
    /// Asked whenever the buffer needs to grow.
    host: Box<dyn Host>,
}

impl LinearMemory {
    /// Create linear memory of `size` bytes, with the first `reserve` bytes set aside.
    ///
    /// The program break starts right after the reserve (rounded up to 8, and never below 8).
    pub fn new(size: u32, reserve: u32, host: Box<dyn Host>) -> LinearMemory {
        // The reserve is bounded by the address space, so rounding it cannot leave it.
        let brk = align_up(cmp::max(reserve, 8), 8).unwrap_or(u32::MAX & !7);
        let len = cmp::max(size, brk);

        LinearMemory {
            bytes: alloc::vec![0; len as usize],
            brk,
            host,
        }
    }

    /// The current size of linear memory, in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Is linear memory empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The current program break.
    #[inline]
    pub fn brk(&self) -> u32 {
        self.brk
    }

    /// Grow the buffer to hold at least `required` bytes.
    pub(crate) fn resize(&mut self, required: u32) -> Result<(), GrowError> {
        let current = self.len();
        if required <= current {
            return Ok(());
        }

        let new = self.host.grow(current, required)?;
        if new < required {
            // The host broke its promise.
            return Err(GrowError::Refused);
        }

        self.bytes.resize(new as usize, 0);

        Ok(())
    }

    /// Read a little-endian word.
    #[inline]
    pub fn read_u32(&self, at: u32) -> u32 {
        let at = at as usize;
        let mut word = [0; 4];
        word.copy_from_slice(&self.bytes[at..at + 4]);

        u32::from_le_bytes(word)
    }

    /// Write a little-endian word.
    #[inline]
    pub fn write_u32(&mut self, at: u32, value: u32) {
        let at = at as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Borrow `len` bytes starting at `at`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bound.
    #[inline]
    pub fn slice(&self, at: u32, len: u32) -> &[u8] {
        &self.bytes[at as usize..at as usize + len as usize]
    }

    /// Mutably borrow `len` bytes starting at `at`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bound.
    #[inline]
    pub fn slice_mut(&mut self, at: u32, len: u32) -> &mut [u8] {
        &mut self.bytes[at as usize..at as usize + len as usize]
    }

    /// Set `len` bytes starting at `at` to `byte`.
    #[inline]
    pub fn fill(&mut self, at: u32, len: u32, byte: u8) {
        for b in self.slice_mut(at, len) {
            *b = byte;
        }
    }

    /// Copy `len` bytes from `from` to `to`. The ranges may overlap.
    #[inline]
    pub fn copy_within(&mut self, from: u32, to: u32, len: u32) {
        let from = from as usize;
        self.bytes.copy_within(from..from + len as usize, to as usize);
    }
}

impl fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LinearMemory")
            .field("len", &self.len())
            .field("brk", &self.brk)
            .finish()
    }
}
