//! Tree bins.
//!
//! Each tree bin holds the free chunks of one size class as a bitwise digital tree (a trie on the
//! chunk size). A node picks its child by the next bit of the size below the bits the size class
//! already fixes, so there is never any rebalancing. Chunks of a size already in the tree hang off
//! that node in a circular same-size chain instead.

use super::{idx2bit, least_bit, left_bits, Bookkeeper, NTREEBINS, TREEBIN_SHIFT};

use crate::chunk::{Chunk, Parent};
use crate::memory::LinearMemory;

/// The tree bin for chunks of `size` bytes.
pub fn compute_tree_index(size: u32) -> u32 {
    let x = size >> TREEBIN_SHIFT;

    if x == 0 {
        0
    } else if x > 0xffff {
        NTREEBINS as u32 - 1
    } else {
        let k = 31 - x.leading_zeros();
        (k << 1) + ((size >> (k + TREEBIN_SHIFT - 1)) & 1)
    }
}

/// How far to shift a size in tree bin `idx` to bring its first branching bit to the top.
#[inline]
pub fn leftshift_for_tree_index(idx: u32) -> u32 {
    if idx == NTREEBINS as u32 - 1 {
        0
    } else {
        31 - ((idx >> 1) + TREEBIN_SHIFT - 2)
    }
}

/// The smallest chunk held by tree bin `idx`.
#[inline]
pub fn min_size_for_tree_index(idx: u32) -> u32 {
    (1 << ((idx >> 1) + TREEBIN_SHIFT)) | ((idx & 1) << ((idx >> 1) + TREEBIN_SHIFT - 1))
}

impl Bookkeeper {
    #[inline]
    fn mark_treemap(&mut self, idx: u32) {
        self.treemap |= idx2bit(idx);
    }

    #[inline]
    fn clear_treemap(&mut self, idx: u32) {
        self.treemap &= !idx2bit(idx);
    }

    #[inline]
    pub(super) fn treemap_is_marked(&self, idx: u32) -> bool {
        self.treemap & idx2bit(idx) != 0
    }

    /// The tree root of bin `idx`.
    #[inline]
    pub(super) fn treebin(&self, idx: u32) -> Option<Chunk> {
        self.treebins[idx as usize]
    }

    /// Of the chunks sized like tree node `v`, the one freed most recently.
    ///
    /// New chunks are linked right behind the node, so that is its `fd`.
    #[inline]
    fn newest_of_size(&self, m: &LinearMemory, v: Chunk) -> Chunk {
        v.fd(m)
    }

    /// Put a free chunk in its tree.
    pub(super) fn insert_large_chunk(&mut self, m: &mut LinearMemory, x: Chunk, size: u32) {
        let idx = compute_tree_index(size);

        x.set_index(m, idx);
        x.set_child(m, 0, None);
        x.set_child(m, 1, None);

        let mut t = match self.treebins[idx as usize] {
            None => {
                self.mark_treemap(idx);
                self.treebins[idx as usize] = Some(x);
                x.set_parent(m, Parent::Root);
                x.set_fd(m, x);
                x.set_bk(m, x);

                return;
            }
            Some(t) => t,
        };

        let mut k = size << leftshift_for_tree_index(idx);
        loop {
            if t.size(m) != size {
                let dir = k >> 31;
                k <<= 1;

                match t.child(m, dir) {
                    Some(c) => t = c,
                    None => {
                        t.set_child(m, dir, Some(x));
                        x.set_parent(m, Parent::Node(t));
                        x.set_fd(m, x);
                        x.set_bk(m, x);

                        return;
                    }
                }
            } else {
                // Join the same-size chain, right behind the node.
                let f = t.fd(m);
                t.set_fd(m, x);
                f.set_bk(m, x);
                x.set_fd(m, f);
                x.set_bk(m, t);
                x.set_parent(m, Parent::Chain);

                return;
            }
        }
    }

    /// Take a free chunk out of its tree.
    ///
    /// A chain member is simply unlinked. A tree node is replaced by the oldest member of its
    /// chain, or if it has none, by a leaf of its subtree.
    pub(super) fn unlink_large_chunk(&mut self, m: &mut LinearMemory, x: Chunk) {
        let xp = x.parent(m);

        let r = if x.bk(m) != x {
            let f = x.fd(m);
            let r = x.bk(m);
            f.set_bk(m, r);
            r.set_fd(m, f);

            Some(r)
        } else {
            self.detach_leaf(m, x)
        };

        match xp {
            Parent::Chain => return,
            Parent::Root => {
                let idx = x.index(m);
                self.treebins[idx as usize] = r;
                if r.is_none() {
                    self.clear_treemap(idx);
                }
            }
            Parent::Node(p) => {
                let dir = if p.child(m, 0) == Some(x) { 0 } else { 1 };
                p.set_child(m, dir, r);
            }
        }

        if let Some(r) = r {
            r.set_parent(m, xp);

            for dir in 0..2 {
                let c = x.child(m, dir);
                r.set_child(m, dir, c);
                if let Some(c) = c {
                    c.set_parent(m, Parent::Node(r));
                }
            }
        }
    }

    /// Cut the rightmost leaf out of the subtree of `x`, if it has any children.
    fn detach_leaf(&mut self, m: &mut LinearMemory, x: Chunk) -> Option<Chunk> {
        let rightmost = |m: &LinearMemory, c: Chunk| {
            c.child(m, 1).map(|r| (r, 1)).or_else(|| c.child(m, 0).map(|l| (l, 0)))
        };

        let (mut r, mut dir) = rightmost(m, x)?;
        let mut holder = x;
        while let Some((c, d)) = rightmost(m, r) {
            holder = r;
            r = c;
            dir = d;
        }

        holder.set_child(m, dir, None);

        Some(r)
    }

    /// Allocate a small request from the smallest chunk in the trees.
    pub(super) fn tmalloc_small(&mut self, m: &mut LinearMemory, nb: u32) -> Option<Chunk> {
        let i = least_bit(self.treemap).trailing_zeros();
        let mut v = self.treebin(i)?;
        let mut t = v;
        let mut rsize = t.size(m) - nb;

        while let Some(c) = t.leftmost_child(m) {
            t = c;
            let trem = t.size(m) - nb;
            if trem < rsize {
                rsize = trem;
                v = t;
            }
        }

        let v = self.newest_of_size(m, v);
        self.unlink_large_chunk(m, v);
        self.carve(m, v, rsize + nb, nb);

        Some(v)
    }

    /// Allocate a large request from the best fitting chunk in the trees.
    pub(super) fn tmalloc_large(&mut self, m: &mut LinearMemory, nb: u32) -> Option<Chunk> {
        let mut v = None;
        // Anything smaller than `nb` wraps around to above this.
        let mut rsize = nb.wrapping_neg();
        let idx = compute_tree_index(nb);

        let mut t = self.treebin(idx);
        if let Some(mut node) = t {
            // Walk down the path of `nb`, remembering the last subtree to the right of it, which
            // holds the smallest chunks above `nb` off the path.
            let mut sizebits = nb << leftshift_for_tree_index(idx);
            let mut rst = None;

            loop {
                let trem = node.size(m).wrapping_sub(nb);
                if trem < rsize {
                    v = Some(node);
                    rsize = trem;
                    if rsize == 0 {
                        t = Some(node);
                        break;
                    }
                }

                let rt = node.child(m, 1);
                let next = node.child(m, sizebits >> 31);
                if rt.is_some() && rt != next {
                    rst = rt;
                }

                match next {
                    Some(n) => node = n,
                    None => {
                        t = rst;
                        break;
                    }
                }

                sizebits <<= 1;
            }
        }

        if t.is_none() && v.is_none() {
            // Nothing in this bin; use the smallest chunk of the next non-empty one.
            let leftbits = left_bits(idx2bit(idx)) & self.treemap;
            if leftbits != 0 {
                t = self.treebin(least_bit(leftbits).trailing_zeros());
            }
        }

        // Find the smallest chunk of the remaining subtree.
        while let Some(node) = t {
            let trem = node.size(m).wrapping_sub(nb);
            if trem < rsize {
                rsize = trem;
                v = Some(node);
            }
            t = node.leftmost_child(m);
        }

        let v = self.newest_of_size(m, v?);
        self.unlink_large_chunk(m, v);
        self.carve(m, v, rsize + nb, nb);

        Some(v)
    }
}
