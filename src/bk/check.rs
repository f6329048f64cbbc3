//! Sanity checks and heap traversal.
//!
//! The checks only run with debug assertions; in release builds they return right away.

use super::small::{is_small, small_index};
use super::tree::{compute_tree_index, leftshift_for_tree_index, min_size_for_tree_index};
use super::{Bookkeeper, MIN_LARGE_SIZE, NSMALLBINS, NTREEBINS};

use crate::block::Block;
use crate::chunk::{Chunk, Parent, ALIGN_MASK, FENCEPOST_HEAD, MIN_CHUNK_SIZE, OVERHEAD, PINUSE};
use crate::memory::LinearMemory;
use crate::stats::Stats;

impl Bookkeeper {
    /// The segment holding the byte at `ptr`.
    pub(super) fn segment_holding(&self, ptr: u32) -> Option<Block> {
        self.segments.iter().find(|seg| seg.holds(ptr)).copied()
    }

    /// Does `mem` look like the payload of a live chunk?
    ///
    /// This catches double frees and offsets that were never handed out, as long as the headers
    /// have not been overwritten.
    pub fn owns(&self, m: &LinearMemory, mem: u32) -> bool {
        if mem & ALIGN_MASK != 0 || mem < OVERHEAD {
            return false;
        }

        let p = Chunk::from_mem(mem);
        let seg = match self.segment_holding(p.ptr()) {
            Some(seg) => seg,
            None => return false,
        };
        if mem > seg.end() || Some(p) == self.top || !p.cinuse(m) {
            return false;
        }

        let size = p.size(m);
        // The chunk and the header of its successor must lie within the segment.
        match p.ptr().checked_add(size).and_then(|x| x.checked_add(OVERHEAD)) {
            Some(end) if size >= MIN_CHUNK_SIZE && end <= seg.end() => p.next(m).pinuse(m),
            _ => false,
        }
    }

    /// Walk every chunk of every segment.
    ///
    /// The walk of a segment stops at the top chunk, or at the first header too small to be a
    /// chunk (the fencepost, or a stub left behind by a retired top chunk).
    fn traverse<F: FnMut(Chunk, u32, bool)>(&self, m: &LinearMemory, mut f: F) {
        for seg in &self.segments {
            let mut q = Chunk::at((seg.ptr() + ALIGN_MASK) & !ALIGN_MASK);

            while q.ptr() + OVERHEAD <= seg.end() && Some(q) != self.top {
                let size = q.size(m);
                if size < MIN_CHUNK_SIZE {
                    break;
                }

                f(q, size, q.cinuse(m));
                q = q.plus(size);
            }
        }
    }

    /// Gather statistics by walking the heap.
    pub fn stats(&self, m: &LinearMemory) -> Stats {
        let mut stats = Stats {
            footprint: self.footprint,
            max_footprint: self.max_footprint,
            segments: self.segments.len() as u32,
            top_size: self.topsize,
            ..Stats::default()
        };

        self.traverse(m, |_, size, inuse| {
            if inuse {
                stats.used_bytes += size;
                stats.used_chunks += 1;
            } else {
                stats.free_bytes += size;
                stats.free_chunks += 1;
            }
        });

        stats
    }

    pub(super) fn check_any_chunk(&self, m: &LinearMemory, p: Chunk) {
        if !cfg!(debug_assertions) {
            return;
        }

        debug_assert!(
            p.to_mem() & ALIGN_MASK == 0 || p.head(m) == FENCEPOST_HEAD,
            "Chunk 0x{:x} is misaligned.",
            p.ptr()
        );
        debug_assert!(
            self.segment_holding(p.ptr()).is_some(),
            "Chunk 0x{:x} is outside the heap.",
            p.ptr()
        );
    }

    pub(super) fn check_top_chunk(&self, m: &LinearMemory) {
        if !cfg!(debug_assertions) {
            return;
        }

        let p = match self.top {
            Some(p) => p,
            None => return,
        };
        let sz = p.size(m);
        let seg = self.segment_holding(p.ptr());

        debug_assert!(seg.is_some(), "The top chunk is outside the heap.");
        debug_assert!(
            self.segments.last().map_or(false, |s| s.holds(p.ptr())),
            "The top chunk is not in the last segment."
        );
        debug_assert!(p.to_mem() & ALIGN_MASK == 0);
        debug_assert_eq!(sz, self.topsize);
        debug_assert!(sz > 0);
        if let Some(seg) = seg {
            debug_assert!(
                seg.end() - p.ptr() - OVERHEAD - sz < 8,
                "The top chunk does not reach the fencepost."
            );
        }
        debug_assert!(p.pinuse(m), "The chunk before the top chunk is free.");
        debug_assert!(!p.plus(sz).pinuse(m));
    }

    pub(super) fn check_malloced_chunk(&self, m: &LinearMemory, p: Chunk, nb: u32) {
        if !cfg!(debug_assertions) {
            return;
        }

        let sz = p.size(m);

        self.check_inuse_chunk(m, p);
        debug_assert_eq!(sz & ALIGN_MASK, 0);
        debug_assert!(sz >= MIN_CHUNK_SIZE);
        debug_assert!(sz >= nb);
        debug_assert!(sz < nb + MIN_CHUNK_SIZE, "Chunk 0x{:x} is oversized.", p.ptr());
    }

    pub(super) fn check_inuse_chunk(&self, m: &LinearMemory, p: Chunk) {
        if !cfg!(debug_assertions) {
            return;
        }

        self.check_any_chunk(m, p);
        debug_assert!(p.cinuse(m), "Chunk 0x{:x} is not in use.", p.ptr());
        debug_assert!(p.next(m).pinuse(m));
        debug_assert!(p.pinuse(m) || p.prev(m).next(m) == p);
    }

    pub(super) fn check_free_chunk(&self, m: &LinearMemory, p: Chunk) {
        if !cfg!(debug_assertions) {
            return;
        }

        let sz = p.size(m);
        let next = p.plus(sz);

        self.check_any_chunk(m, p);
        debug_assert!(!p.cinuse(m), "Chunk 0x{:x} is in use.", p.ptr());
        debug_assert!(!next.pinuse(m));

        if Some(p) != self.top {
            debug_assert!(sz >= MIN_CHUNK_SIZE);
            debug_assert_eq!(sz & ALIGN_MASK, 0);
            debug_assert_eq!(next.prev_foot(m), sz, "Broken boundary tag of 0x{:x}.", p.ptr());
            debug_assert!(p.pinuse(m), "Two adjacent free chunks at 0x{:x}.", p.ptr());
            debug_assert!(Some(next) == self.top || next.cinuse(m));
            debug_assert_eq!(p.fd(m).bk(m), p);
            debug_assert_eq!(p.bk(m).fd(m), p);
        }
    }

    /// Check every bin, the top chunk and the segments.
    pub fn check_malloc_state(&self, m: &LinearMemory) {
        if !cfg!(debug_assertions) {
            return;
        }

        for i in 0..NSMALLBINS as u32 {
            self.check_smallbin(m, i);
        }
        for i in 0..NTREEBINS as u32 {
            self.check_treebin(m, i);
        }

        if let Some(top) = self.top {
            self.check_top_chunk(m);
            debug_assert!(!self.bin_find(m, top), "The top chunk is in a bin.");
        }

        let mut total = 0;
        self.traverse(m, |q, size, inuse| {
            if inuse {
                self.check_inuse_chunk(m, q);
            } else {
                self.check_free_chunk(m, q);
                debug_assert!(self.bin_find(m, q), "Free chunk 0x{:x} is in no bin.", q.ptr());
            }
            total += size;
        });

        debug_assert!(total <= self.footprint);
        debug_assert!(self.footprint <= self.max_footprint);
    }

    fn check_smallbin(&self, m: &LinearMemory, idx: u32) {
        let head = self.smallbins[idx as usize];
        let empty = !self.smallmap_is_marked(idx);

        debug_assert_eq!(head.is_none(), empty, "Small map out of sync for bin {}.", idx);

        if let Some(head) = head {
            let mut p = head;
            loop {
                let size = p.size(m);

                self.check_free_chunk(m, p);
                debug_assert_eq!(small_index(size), idx);

                let q = p.next(m);
                if q.head(m) & !PINUSE != FENCEPOST_HEAD {
                    self.check_inuse_chunk(m, q);
                }

                p = p.fd(m);
                if p == head {
                    break;
                }
            }
        }
    }

    fn check_treebin(&self, m: &LinearMemory, idx: u32) {
        let root = self.treebin(idx);
        let empty = !self.treemap_is_marked(idx);

        debug_assert_eq!(root.is_none(), empty, "Tree map out of sync for bin {}.", idx);

        if let Some(root) = root {
            debug_assert_eq!(root.parent(m), Parent::Root);
            self.check_tree(m, root);
        }
    }

    fn check_tree(&self, m: &LinearMemory, t: Chunk) {
        let tindex = t.index(m);
        let tsize = t.size(m);
        let idx = compute_tree_index(tsize);

        debug_assert_eq!(tindex, idx);
        debug_assert!(tsize >= MIN_LARGE_SIZE);
        debug_assert!(tsize >= min_size_for_tree_index(idx));
        debug_assert!(idx == NTREEBINS as u32 - 1 || tsize < min_size_for_tree_index(idx + 1));

        let mut u = t;
        let mut node = None;
        loop {
            self.check_any_chunk(m, u);
            debug_assert_eq!(u.index(m), tindex);
            debug_assert_eq!(u.size(m), tsize);
            debug_assert!(!u.cinuse(m));
            debug_assert!(!u.next(m).pinuse(m));
            debug_assert_eq!(u.fd(m).bk(m), u);
            debug_assert_eq!(u.bk(m).fd(m), u);

            let left = u.child(m, 0);
            let right = u.child(m, 1);
            match u.parent(m) {
                Parent::Chain => {
                    debug_assert!(left.is_none() && right.is_none());
                }
                parent => {
                    // Exactly one member of the ring is in the tree.
                    debug_assert!(node.is_none());
                    node = Some(u);

                    match parent {
                        Parent::Node(p) => {
                            debug_assert!(p != u);
                            debug_assert!(p.child(m, 0) == Some(u) || p.child(m, 1) == Some(u));
                        }
                        _ => debug_assert_eq!(self.treebin(tindex), Some(u)),
                    }

                    for c in [left, right].iter().flatten() {
                        debug_assert_eq!(c.parent(m), Parent::Node(u));
                        debug_assert!(*c != u);
                        self.check_tree(m, *c);
                    }

                    if let (Some(l), Some(r)) = (left, right) {
                        debug_assert!(l.size(m) < r.size(m));
                    }
                }
            }

            u = u.bk(m);
            if u == t {
                break;
            }
        }

        debug_assert!(node.is_some());
    }

    /// Is the free chunk `p` in a bin?
    fn bin_find(&self, m: &LinearMemory, p: Chunk) -> bool {
        let size = p.size(m);

        if is_small(size) {
            let head = match self.smallbins[small_index(size) as usize] {
                Some(head) => head,
                None => return false,
            };

            let mut q = head;
            loop {
                if q == p {
                    return true;
                }
                q = q.bk(m);
                if q == head {
                    return false;
                }
            }
        } else {
            let tidx = compute_tree_index(size);
            let mut t = self.treebin(tidx);
            let mut sizebits = size << leftshift_for_tree_index(tidx);

            while let Some(node) = t {
                if node.size(m) == size {
                    break;
                }
                t = node.child(m, sizebits >> 31);
                sizebits <<= 1;
            }

            let t = match t {
                Some(t) => t,
                None => return false,
            };

            let mut u = t;
            loop {
                if u == p {
                    return true;
                }
                u = u.bk(m);
                if u == t {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use alloc::boxed::Box;

    use super::*;

    use crate::chunk::request2size;
    use crate::sys::Fixed;

    #[test]
    fn test_owns() {
        let mut bk = Bookkeeper::new(u32::MAX);
        let mut m = LinearMemory::new(64 * 1024, 1024, Box::new(Fixed));

        let a = bk.malloc(&mut m, request2size(100)).unwrap();
        let b = bk.malloc(&mut m, request2size(100)).unwrap();

        assert!(bk.owns(&m, a.to_mem()));
        assert!(!bk.owns(&m, a.to_mem() + 8));
        assert!(!bk.owns(&m, 4));
        assert!(!bk.owns(&m, 100_000));

        bk.free(&mut m, a);
        assert!(!bk.owns(&m, a.to_mem()));
        // Merged into the top chunk along with its neighbour.
        bk.free(&mut m, b);
        assert!(!bk.owns(&m, b.to_mem()));
        assert!(!bk.owns(&m, a.to_mem()));
    }

    #[test]
    fn test_stats() {
        let mut bk = Bookkeeper::new(u32::MAX);
        let mut m = LinearMemory::new(64 * 1024, 1024, Box::new(Fixed));

        let a = bk.malloc(&mut m, 32).unwrap();
        let _b = bk.malloc(&mut m, 48).unwrap();
        bk.free(&mut m, a);

        let stats = bk.stats(&m);
        assert_eq!(stats.used_bytes, 48);
        assert_eq!(stats.used_chunks, 1);
        assert_eq!(stats.free_bytes, 32);
        assert_eq!(stats.free_chunks, 1);
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.used_bytes + stats.unused() + OVERHEAD, stats.footprint);
    }
}
