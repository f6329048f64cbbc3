//! Small bins.
//!
//! Each small bin is a circular doubly linked list of free chunks of one exact size, threaded
//! through the `fd` and `bk` links. The bin itself only stores the head.

use super::{idx2bit, Bookkeeper, NSMALLBINS, SMALLBIN_SHIFT};

use crate::chunk::Chunk;
use crate::memory::LinearMemory;

/// Does a chunk of this size belong in a small bin?
#[inline]
pub fn is_small(size: u32) -> bool {
    size >> SMALLBIN_SHIFT < NSMALLBINS as u32
}

/// The small bin for chunks of `size` bytes.
#[inline]
pub fn small_index(size: u32) -> u32 {
    size >> SMALLBIN_SHIFT
}

/// The chunk size held by small bin `idx`.
#[inline]
pub fn small_index2size(idx: u32) -> u32 {
    idx << SMALLBIN_SHIFT
}

impl Bookkeeper {
    #[inline]
    fn mark_smallmap(&mut self, idx: u32) {
        self.smallmap |= idx2bit(idx);
    }

    #[inline]
    fn clear_smallmap(&mut self, idx: u32) {
        self.smallmap &= !idx2bit(idx);
    }

    #[inline]
    pub(super) fn smallmap_is_marked(&self, idx: u32) -> bool {
        self.smallmap & idx2bit(idx) != 0
    }

    /// Push a free chunk at the head of its bin.
    pub(super) fn insert_small_chunk(&mut self, m: &mut LinearMemory, p: Chunk, size: u32) {
        let idx = small_index(size);

        match self.smallbins[idx as usize] {
            None => {
                p.set_fd(m, p);
                p.set_bk(m, p);
                self.mark_smallmap(idx);
            }
            Some(f) => {
                let b = f.bk(m);
                p.set_fd(m, f);
                p.set_bk(m, b);
                b.set_fd(m, p);
                f.set_bk(m, p);
            }
        }

        self.smallbins[idx as usize] = Some(p);
    }

    /// Take a free chunk out of its bin, wherever it is.
    pub(super) fn unlink_small_chunk(&mut self, m: &mut LinearMemory, p: Chunk, size: u32) {
        let idx = small_index(size);
        let f = p.fd(m);
        let b = p.bk(m);

        debug_assert!(self.smallmap_is_marked(idx), "Unlinking from an empty small bin.");

        if f == p {
            self.smallbins[idx as usize] = None;
            self.clear_smallmap(idx);
        } else {
            b.set_fd(m, f);
            f.set_bk(m, b);

            if self.smallbins[idx as usize] == Some(p) {
                self.smallbins[idx as usize] = Some(f);
            }
        }
    }

    /// Pop the head of small bin `idx`.
    pub(super) fn unlink_first_small_chunk(&mut self, m: &mut LinearMemory, idx: u32) -> Option<Chunk> {
        let p = self.smallbins[idx as usize]?;
        self.unlink_small_chunk(m, p, small_index2size(idx));

        Some(p)
    }
}
