//! Memory bookkeeping.
//!
//! This module is the core of `linalloc`. It keeps track of the free chunks in linear memory, such
//! that allocation, reallocation and deallocation are all efficient.
//!
//! Free chunks are kept in two kinds of bins. Small chunks (below 256 bytes) live in exact-size
//! doubly linked lists, one per multiple of 8. Larger chunks live in bitwise digital trees, one
//! per power-of-two-ish size class, keyed on their exact size. Both kinds of bins have a bitmap
//! telling which of them are non-empty, so finding the next non-empty bin is a bit scan.
//!
//! Beyond the bins sits the top chunk, the free space at the end of the newest segment. Whatever
//! the bins cannot serve is carved from it, and once it runs dry, the program break is extended.
//!
//! Boundary tags make coalescing constant time: a chunk knows whether its predecessor is free,
//! and a free chunk writes its size at its end, so both neighbours are reachable without search.

mod check;
mod small;
mod top;
mod tree;

use alloc::vec::Vec;

use crate::block::Block;
use crate::chunk::{Chunk, MIN_CHUNK_SIZE, OVERHEAD, PINUSE};
use crate::error::AllocError;
use crate::memory::LinearMemory;

use self::small::is_small;

/// The number of small bins.
pub const NSMALLBINS: usize = 32;
/// The number of tree bins.
pub const NTREEBINS: usize = 32;
/// Small bin `i` holds chunks of exactly `i << SMALLBIN_SHIFT` bytes.
const SMALLBIN_SHIFT: u32 = 3;
/// Tree bin `0` starts at `1 << TREEBIN_SHIFT` bytes.
const TREEBIN_SHIFT: u32 = 8;
/// The smallest chunk kept in a tree.
const MIN_LARGE_SIZE: u32 = 1 << TREEBIN_SHIFT;

/// The bit of bin `i` in a bin map.
#[inline]
fn idx2bit(i: u32) -> u32 {
    1 << i
}

/// Isolate the lowest set bit.
#[inline]
fn least_bit(x: u32) -> u32 {
    x & x.wrapping_neg()
}

/// Mask of all bits left of the lowest set bit of `x`.
#[inline]
fn left_bits(x: u32) -> u32 {
    (x << 1) | (x << 1).wrapping_neg()
}

/// The memory bookkeeper.
///
/// The bookkeeper never owns linear memory itself; every operation borrows it. Only making use
/// of the chunks it hands out (and following the assumptions of each method) keeps the headers
/// consistent.
pub struct Bookkeeper {
    /// Which small bins are non-empty.
    smallmap: u32,
    /// Which tree bins are non-empty.
    treemap: u32,
    /// The heads of the small bins.
    ///
    /// Each is a circular doubly linked list through `fd`/`bk`. Chunks are pushed and popped at
    /// the head, so the most recently freed chunk is reused first.
    smallbins: [Option<Chunk>; NSMALLBINS],
    /// The roots of the tree bins.
    treebins: [Option<Chunk>; NTREEBINS],
    /// The top chunk, once any memory was acquired.
    top: Option<Chunk>,
    /// The size of the top chunk.
    topsize: u32,
    /// The segments making up the heap, in acquisition order.
    ///
    /// Guarantees
    /// ==========
    ///
    /// 1. Every segment ends in a fencepost header.
    /// 2. The top chunk is in the last segment.
    segments: Vec<Block>,
    /// Trim once the top chunk grows past this.
    trim_threshold: u32,
    /// The current trim trigger. Disabled (maximal) after a trim that gave nothing back.
    trim_check: u32,
    /// The bytes of linear memory currently owned.
    footprint: u32,
    /// The most bytes ever owned.
    max_footprint: u32,
}

impl Bookkeeper {
    /// Create a new, empty bookkeeper.
    ///
    /// This will make no allocations or BRKs.
    pub const fn new(trim_threshold: u32) -> Bookkeeper {
        Bookkeeper {
            smallmap: 0,
            treemap: 0,
            smallbins: [None; NSMALLBINS],
            treebins: [None; NTREEBINS],
            top: None,
            topsize: 0,
            segments: Vec::new(),
            trim_threshold,
            trim_check: trim_threshold,
            footprint: 0,
            max_footprint: 0,
        }
    }

    /// Get the bin logger of this bookkeeper.
    #[cfg(feature = "log")]
    pub fn logger(&self) -> crate::log::internal::BinLogger {
        crate::log::internal::BinLogger {
            smallmap: self.smallmap,
            treemap: self.treemap,
            top: self.top.map(|t| (t.ptr(), self.topsize)),
        }
    }

    /// Allocate a chunk of `nb` bytes.
    ///
    /// `nb` must be a normalized chunk size. The chunk returned is marked in use, and is at most
    /// `MIN_CHUNK_SIZE - 8` bytes bigger than asked for.
    ///
    /// # Example
    ///
    /// The bins are tried first, from the exact small bin up, then the top chunk is carved:
    ///
    /// ```notrust
    ///    Segment
    ///   I-----I---I---------I-------------------------------I
    ///    used  nb   used      top
    ///
    ///   I-----I---I---------I--I----------------------------I
    ///    used  nb   used     nb  top
    /// ```
    ///
    /// If the top chunk is too small as well, the program break is extended first.
    pub fn malloc(&mut self, m: &mut LinearMemory, nb: u32) -> Result<Chunk, AllocError> {
        log!(self; INTERNAL, "Allocating a chunk of {} bytes.", nb);

        let p = match self.malloc_from_bins(m, nb) {
            Some(p) => p,
            None if nb < self.topsize => self.carve_top(m, nb).ok_or(AllocError::Exhausted(nb))?,
            None => self.sys_alloc(m, nb)?,
        };

        self.check_malloced_chunk(m, p, nb);

        Ok(p)
    }

    /// Find a chunk in the bins, if any fits.
    fn malloc_from_bins(&mut self, m: &mut LinearMemory, nb: u32) -> Option<Chunk> {
        if is_small(nb) {
            let idx = small::small_index(nb);
            let smallbits = self.smallmap >> idx;

            if smallbits & 0b11 != 0 {
                // Either an exact fit, or one only 8 bytes too big, which cannot be split anyway.
                let idx = idx + (!smallbits & 1);
                let p = self.unlink_first_small_chunk(m, idx)?;
                p.set_inuse_and_pinuse(m, small::small_index2size(idx));

                log!(self; INTERNAL, "Exact fit 0x{:x} from small bin {}.", p.ptr(), idx);

                Some(p)
            } else if smallbits != 0 {
                // The smallest bigger small bin.
                let leftbits = (smallbits << idx) & left_bits(idx2bit(idx));
                let i = least_bit(leftbits).trailing_zeros();
                let p = self.unlink_first_small_chunk(m, i)?;
                self.carve(m, p, small::small_index2size(i), nb);

                Some(p)
            } else if self.treemap != 0 {
                self.tmalloc_small(m, nb)
            } else {
                None
            }
        } else if self.treemap != 0 {
            self.tmalloc_large(m, nb)
        } else {
            None
        }
    }

    /// Hand out the first `nb` bytes of the free chunk `p` of `size` bytes.
    ///
    /// `p` must already be unlinked. The remainder goes into a bin, unless it is too small to be a
    /// chunk of its own, in which case `p` is handed out whole.
    fn carve(&mut self, m: &mut LinearMemory, p: Chunk, size: u32, nb: u32) {
        let rsize = size - nb;

        if rsize < MIN_CHUNK_SIZE {
            p.set_inuse_and_pinuse(m, size);
        } else {
            p.set_size_and_pinuse_of_inuse_chunk(m, nb);
            let r = p.plus(nb);
            r.set_size_and_pinuse_of_free_chunk(m, rsize);
            self.insert_chunk(m, r, rsize);
        }
    }

    /// Free an in-use chunk.
    ///
    /// The chunk is merged with its free neighbours, and either folded into the top chunk or put
    /// in a bin. If the top chunk grew past the trim threshold, its tail is released.
    pub fn free(&mut self, m: &mut LinearMemory, p: Chunk) {
        log!(self; DEBUG, "Freeing chunk 0x{:x}.", p.ptr());

        self.check_inuse_chunk(m, p);

        let psize = p.size(m);
        // The header may end up inside a bigger free chunk; it must not look live anymore.
        p.clear_cinuse(m);

        if self.dispose_chunk(m, p, psize) && self.topsize > self.trim_check {
            self.sys_trim(m, 0);
        }
    }

    /// Put the chunk `p` of `psize` bytes back, coalescing with its neighbours.
    ///
    /// Returns `true` if it was folded into the top chunk.
    fn dispose_chunk(&mut self, m: &mut LinearMemory, mut p: Chunk, mut psize: u32) -> bool {
        let next = p.plus(psize);

        // Merge backwards.
        if !p.pinuse(m) {
            let prevsize = p.prev_foot(m);
            let prev = p.minus(prevsize);
            self.unlink_chunk(m, prev, prevsize);

            p = prev;
            psize += prevsize;
        }

        // Merge forwards.
        if !next.cinuse(m) {
            if Some(next) == self.top {
                self.topsize += psize;
                self.top = Some(p);
                p.set_head(m, self.topsize | PINUSE);

                self.check_top_chunk(m);

                return true;
            }

            let nsize = next.size(m);
            self.unlink_chunk(m, next, nsize);
            psize += nsize;
            p.set_size_and_pinuse_of_free_chunk(m, psize);
        } else {
            p.set_free_with_pinuse(m, psize, next);
        }

        self.insert_chunk(m, p, psize);
        self.check_free_chunk(m, p);

        false
    }

    /// Put a free chunk in its bin.
    fn insert_chunk(&mut self, m: &mut LinearMemory, p: Chunk, size: u32) {
        if is_small(size) {
            self.insert_small_chunk(m, p, size);
        } else {
            self.insert_large_chunk(m, p, size);
        }
    }

    /// Take a free chunk out of its bin.
    fn unlink_chunk(&mut self, m: &mut LinearMemory, p: Chunk, size: u32) {
        if is_small(size) {
            self.unlink_small_chunk(m, p, size);
        } else {
            self.unlink_large_chunk(m, p);
        }
    }

    /// Resize an in-use chunk to `nb` bytes without moving it.
    ///
    /// Shrinking always succeeds; the tail is given back. Growing succeeds if the following chunk
    /// is the top chunk or a free chunk with enough room. On failure nothing is changed.
    pub fn try_realloc_chunk(&mut self, m: &mut LinearMemory, p: Chunk, nb: u32) -> bool {
        let oldsize = p.size(m);
        let next = p.plus(oldsize);

        if oldsize >= nb {
            log!(self; INTERNAL, "Shrinking 0x{:x} in place.", p.ptr());

            let rsize = oldsize - nb;
            if rsize >= MIN_CHUNK_SIZE {
                let r = p.plus(nb);
                p.set_inuse(m, nb);
                r.set_inuse(m, rsize);
                self.dispose_chunk(m, r, rsize);
            }
        } else if Some(next) == self.top {
            if oldsize + self.topsize <= nb {
                return false;
            }

            log!(self; INTERNAL, "Growing 0x{:x} into the top chunk.", p.ptr());

            let newtopsize = oldsize + self.topsize - nb;
            let newtop = p.plus(nb);
            p.set_inuse(m, nb);
            newtop.set_head(m, newtopsize | PINUSE);
            self.top = Some(newtop);
            self.topsize = newtopsize;
        } else if !next.cinuse(m) {
            let nextsize = next.size(m);
            if oldsize + nextsize < nb {
                return false;
            }

            log!(self; INTERNAL, "Growing 0x{:x} into its free successor.", p.ptr());

            self.unlink_chunk(m, next, nextsize);
            let rsize = oldsize + nextsize - nb;
            if rsize < MIN_CHUNK_SIZE {
                p.set_inuse(m, oldsize + nextsize);
            } else {
                let r = p.plus(nb);
                p.set_inuse(m, nb);
                r.set_inuse(m, rsize);
                self.dispose_chunk(m, r, rsize);
            }
        } else {
            return false;
        }

        self.check_inuse_chunk(m, p);

        true
    }

    /// Allocate a chunk of `nb` bytes whose payload is aligned to `alignment`.
    ///
    /// `alignment` must be a power of two bigger than the chunk alignment, and `nb` plus
    /// `alignment` must not overflow a request.
    ///
    /// # Example
    ///
    /// We allocate enough to fit an aligned chunk anywhere, then give back the leader and the
    /// trailer:
    ///
    /// ```notrust
    ///   I------------------------------------I
    ///    malloc(nb + alignment + 8)
    ///
    ///   I--------I-----------I---------------I
    ///     leader   nb (aligned)  trailer
    ///       ^                      ^
    ///     freed                  freed
    /// ```
    pub fn memalign(&mut self, m: &mut LinearMemory, alignment: u32, nb: u32) -> Result<Chunk, AllocError> {
        debug_assert!(alignment.is_power_of_two() && alignment > crate::chunk::ALIGNMENT);

        let req = nb + alignment + MIN_CHUNK_SIZE - OVERHEAD;
        let mut p = self.malloc(m, req)?;

        let mem = p.to_mem();
        if mem & (alignment - 1) != 0 {
            // Find an aligned spot far enough in to leave a whole chunk in front of it.
            let br = Chunk::from_mem((mem + alignment - 1) & !(alignment - 1));
            let pos = if br.ptr() - p.ptr() >= MIN_CHUNK_SIZE { br } else { br.plus(alignment) };

            let leadsize = pos.ptr() - p.ptr();
            let newsize = p.size(m) - leadsize;

            pos.set_inuse(m, newsize);
            p.set_inuse(m, leadsize);
            self.dispose_chunk(m, p, leadsize);

            p = pos;
        }

        // Give back the trailer.
        let size = p.size(m);
        if size > nb + MIN_CHUNK_SIZE {
            let rsize = size - nb;
            let rem = p.plus(nb);
            p.set_inuse(m, nb);
            rem.set_inuse(m, rsize);
            self.dispose_chunk(m, rem, rsize);
        }

        debug_assert!(p.to_mem() & (alignment - 1) == 0, "Alignment failed.");
        self.check_inuse_chunk(m, p);

        Ok(p)
    }
}

#[cfg(test)]
mod test {
    use alloc::boxed::Box;

    use super::*;

    use crate::chunk::request2size;
    use crate::sys::Fixed;

    fn setup() -> (Bookkeeper, LinearMemory) {
        (Bookkeeper::new(u32::MAX), LinearMemory::new(64 * 1024, 1024, Box::new(Fixed)))
    }

    #[test]
    fn test_bit_tricks() {
        assert_eq!(least_bit(0b1011000), 0b1000);
        assert_eq!(left_bits(0b100), !0b111);
        assert_eq!(left_bits(1 << 31), 0);
    }

    #[test]
    fn test_first_chunk() {
        let (mut bk, mut m) = setup();

        let a = bk.malloc(&mut m, request2size(100)).unwrap();
        let b = bk.malloc(&mut m, request2size(100)).unwrap();

        assert_eq!(a.to_mem(), 1032);
        assert_eq!(b.to_mem(), 1144);
        assert_eq!(bk.segments.len(), 1);
        bk.check_malloc_state(&m);
    }

    #[test]
    fn test_lifo_small_bin() {
        let (mut bk, mut m) = setup();
        let nb = request2size(24);

        let chunks: Vec<_> = (0..4).map(|_| bk.malloc(&mut m, nb).unwrap()).collect();
        // Keep them apart from each other and from the top.
        let _guard = bk.malloc(&mut m, nb).unwrap();
        bk.free(&mut m, chunks[0]);
        bk.free(&mut m, chunks[2]);

        assert_eq!(bk.malloc(&mut m, nb).unwrap(), chunks[2]);
        assert_eq!(bk.malloc(&mut m, nb).unwrap(), chunks[0]);
        bk.check_malloc_state(&m);
    }

    #[test]
    fn test_lifo_tree_chain() {
        let (mut bk, mut m) = setup();
        let nb = request2size(600);

        let chunks: Vec<_> = (0..4)
            .map(|_| {
                let p = bk.malloc(&mut m, nb).unwrap();
                // Guard, so nothing coalesces.
                bk.malloc(&mut m, 16).unwrap();
                p
            })
            .collect();
        for &p in &chunks {
            bk.free(&mut m, p);
        }
        assert_eq!(bk.treemap.count_ones(), 1);
        bk.check_malloc_state(&m);

        // Equal sizes come back newest first.
        assert_eq!(bk.malloc(&mut m, nb).unwrap(), chunks[3]);
        assert_eq!(bk.malloc(&mut m, nb).unwrap(), chunks[2]);
        bk.check_malloc_state(&m);
    }

    #[test]
    fn test_coalesce_into_top() {
        let (mut bk, mut m) = setup();

        let before = bk.malloc(&mut m, 16).unwrap();
        bk.free(&mut m, before);
        let top = bk.topsize;

        let a = bk.malloc(&mut m, 64).unwrap();
        let b = bk.malloc(&mut m, 512).unwrap();
        let c = bk.malloc(&mut m, 32).unwrap();
        bk.free(&mut m, a);
        bk.free(&mut m, c);
        bk.free(&mut m, b);

        // Everything went back to the top chunk.
        assert_eq!(bk.topsize, top);
        assert_eq!(bk.smallmap, 0);
        assert_eq!(bk.treemap, 0);
        bk.check_malloc_state(&m);
    }

    #[test]
    fn test_realloc_in_place() {
        let (mut bk, mut m) = setup();

        let p = bk.malloc(&mut m, 64).unwrap();
        // Next to the top chunk.
        assert!(bk.try_realloc_chunk(&mut m, p, 4096));
        assert_eq!(p.size(&m), 4096);

        let q = bk.malloc(&mut m, 64).unwrap();
        assert!(bk.try_realloc_chunk(&mut m, p, 1024));
        // The tail went into the tree, and can now be grown into again.
        assert_eq!(bk.treemap.count_ones(), 1);
        assert!(bk.try_realloc_chunk(&mut m, p, 2048));
        // But not past the in-use chunk behind it.
        assert!(!bk.try_realloc_chunk(&mut m, p, 8192));
        assert_eq!(q.size(&m), 64);
        bk.check_malloc_state(&m);
    }

    #[test]
    fn test_memalign() {
        let (mut bk, mut m) = setup();

        for &align in &[16, 64, 256, 4096] {
            let p = bk.memalign(&mut m, align, request2size(40)).unwrap();
            assert_eq!(p.to_mem() % align, 0);
            assert!(p.size(&m) >= request2size(40));
        }
        bk.check_malloc_state(&m);
    }
}
