//! The top chunk and the segments.
//!
//! The top chunk is the free space at the end of the newest segment. It is carved from the front
//! whenever the bins come up empty, and extended (or replaced) by growing the program break.

use core::cmp;

use shim::config;

use super::Bookkeeper;

use crate::block::Block;
use crate::chunk::{Chunk, ALIGNMENT, ALIGN_MASK, FENCEPOST_HEAD, MAX_REQUEST, MIN_CHUNK_SIZE, OVERHEAD, PINUSE};
use crate::error::AllocError;
use crate::memory::LinearMemory;

impl Bookkeeper {
    /// Make everything from `start` to the fencepost before `end` the top chunk.
    pub(super) fn init_top(&mut self, m: &mut LinearMemory, start: u32, end: u32) {
        let p = Chunk::at((start + ALIGN_MASK) & !ALIGN_MASK);
        let size = (end - OVERHEAD - p.ptr()) & !ALIGN_MASK;

        p.set_head(m, size | PINUSE);
        p.plus(size).set_head(m, FENCEPOST_HEAD);

        self.top = Some(p);
        self.topsize = size;
        // Reset on every change of the top chunk.
        self.trim_check = self.trim_threshold;
    }

    /// Carve `nb` bytes off the front of the top chunk.
    ///
    /// The top chunk must be strictly bigger than `nb`.
    pub(super) fn carve_top(&mut self, m: &mut LinearMemory, nb: u32) -> Option<Chunk> {
        let p = self.top?;
        debug_assert!(nb < self.topsize, "Carving more than the top chunk holds.");

        let rsize = self.topsize - nb;
        let r = p.plus(nb);
        r.set_head(m, rsize | PINUSE);
        p.set_size_and_pinuse_of_inuse_chunk(m, nb);

        self.top = Some(r);
        self.topsize = rsize;

        log!(self; INTERNAL, "Carved 0x{:x} from the top chunk.", p.ptr());

        self.check_top_chunk(m);

        Some(p)
    }

    /// Grow the heap by at least `nb` bytes, and carve `nb` bytes from the new top chunk.
    ///
    /// If the program break still ends at the last segment, the segment and its top chunk are
    /// extended. Otherwise someone else moved the break in between, and a new segment is started.
    pub(super) fn sys_alloc(&mut self, m: &mut LinearMemory, nb: u32) -> Result<Chunk, AllocError> {
        log!(self; NOTE, "Out of free chunks for {} bytes, growing the heap.", nb);

        // Room for the chunk, a fencepost, a minimal top, and an unaligned break.
        let asize = nb
            .checked_add(OVERHEAD + MIN_CHUNK_SIZE + ALIGNMENT)
            .ok_or(AllocError::TooLarge(nb))?;
        let block = m.canonical_brk(asize)?;

        self.footprint += block.size();
        self.max_footprint = cmp::max(self.max_footprint, self.footprint);

        match (self.segments.last_mut(), self.top) {
            (Some(seg), Some(top)) if seg.left_to(&block) => {
                log!(DEBUG, "Extending segment {:?} by {:?}.", seg, block);

                let mut block = block;
                // Adjacent, so this cannot fail.
                let _ = seg.merge_right(&mut block);
                let end = seg.end();

                self.init_top(m, top.ptr(), end);
            }
            _ => self.add_segment(m, block),
        }

        self.check_malloc_state(m);

        if nb < self.topsize {
            if let Some(p) = self.carve_top(m, nb) {
                return Ok(p);
            }
        }

        Err(AllocError::Exhausted(nb))
    }

    /// Start a new segment, retiring the old top chunk into the bins.
    fn add_segment(&mut self, m: &mut LinearMemory, block: Block) {
        log!(self; NOTE, "Adding segment {:?}.", block);

        if let Some(old) = self.top {
            let tsize = self.topsize;
            let fence = old.plus(tsize);

            if tsize >= MIN_CHUNK_SIZE {
                old.set_free_with_pinuse(m, tsize, fence);
                self.insert_chunk(m, old, tsize);
            } else if tsize > 0 {
                // Too small to be free; it stays behind as a stub.
                old.set_inuse_and_pinuse(m, tsize);
            }
        }

        self.segments.push(block);
        self.init_top(m, block.ptr(), block.end());
    }

    /// Give the unused tail of the top chunk back to the program break.
    ///
    /// At least `pad` bytes are kept. Memory is released in whole growth granules, and only if
    /// the top segment still ends at the break. Returns whether anything was released.
    pub fn sys_trim(&mut self, m: &mut LinearMemory, pad: u32) -> bool {
        let mut released = 0;

        if pad < MAX_REQUEST {
            if let Some(top) = self.top {
                // Keep room for a minimal top chunk and the fencepost.
                let pad = pad + MIN_CHUNK_SIZE + OVERHEAD;

                if self.topsize > pad {
                    let unit = config::GRANULARITY;
                    let extra = (self.topsize - pad - 1) / unit * unit;

                    if let Some(seg) = self.segments.last().copied() {
                        if extra > 0 && seg.holds(top.ptr()) && seg.size() >= extra {
                            let (keep, tail) = seg.split(seg.size() - extra);

                            if m.release(tail).is_ok() {
                                released = extra;

                                self.footprint -= extra;
                                if let Some(last) = self.segments.last_mut() {
                                    *last = keep;
                                }
                                self.init_top(m, top.ptr(), keep.end());

                                log!(self; NOTE, "Trimmed {} bytes off the top chunk.", extra);
                            }
                        }
                    }
                }

                if released == 0 && self.topsize > self.trim_check {
                    self.trim_check = u32::MAX;
                }
            }
        }

        released != 0
    }
}
