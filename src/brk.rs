//! BRK abstractions.
//!
//! This module provides the program break over linear memory. The heap is not its only user:
//! anything else owning memory above the static area (file buffers, a stack) may move the break
//! too, which is why the allocator has to cope with non-contiguous segments.

use core::cmp;

use shim::config;

use crate::block::Block;
use crate::error::GrowError;
use crate::memory::{align_up, LinearMemory};

impl LinearMemory {
    /// Extend the program break, and return the old one.
    ///
    /// Linear memory is grown through the host if the new break passes its end.
    pub fn sbrk(&mut self, increment: u32) -> Result<u32, GrowError> {
        log!(NOTE, "Incrementing the program break by {} bytes.", increment);

        let old_brk = self.brk;
        let new_brk = old_brk.checked_add(increment).ok_or(GrowError::Overflow)?;

        self.resize(new_brk)?;
        self.brk = new_brk;

        log!(INTERNAL, "Program break set to 0x{:x}.", new_brk);

        Ok(old_brk)
    }

    /// Release memory back to the program break.
    ///
    /// This only succeeds if the block borders the break. If failed, we return the block.
    pub fn release(&mut self, block: Block) -> Result<(), Block> {
        // Check if we are actually next to the program break.
        if block.end() == self.brk {
            log!(DEBUG, "Releasing {:?} to the program break.", block);

            self.brk = block.ptr();

            Ok(())
        } else {
            log!(DEBUG, "Unable to release {:?} to the program break.", block);

            Err(block)
        }
    }

    /// BRK new space for at least `size` bytes.
    ///
    /// Extra space is acquired to limit the number of growths, rounded to the growth
    /// granularity. When that much is not to be had, all that is left below the end of linear
    /// memory is taken, or failing that, exactly `size` bytes.
    pub fn canonical_brk(&mut self, size: u32) -> Result<Block, GrowError> {
        // Calculate the canonical size (extra space is acquired to limit the number of growths).
        let canonical = size
            .checked_add(config::extra_brk(size))
            .and_then(|x| align_up(x, config::GRANULARITY));

        if let Some(brk_size) = canonical {
            if let Ok(ptr) = self.sbrk(brk_size) {
                return Ok(Block::from_raw_parts(ptr, brk_size));
            }
        }

        // Use up what linear memory has left, if that is enough.
        let avail = self.len().saturating_sub(self.brk) & !7;
        let brk_size = if avail >= size { avail } else { cmp::max(size, 8) };

        let ptr = self.sbrk(brk_size)?;

        Ok(Block::from_raw_parts(ptr, brk_size))
    }
}
