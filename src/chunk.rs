//! Chunks and their boundary tags.
//!
//! A chunk is a span of linear memory with an in-band header. This module is the only place that
//! knows how headers, boundary tags and free list links are laid out; everything above it works
//! with `Chunk` handles.
//!
//! ```notrust
//!   chunk ->  +-----------------------------+
//!             | prev_foot: size of previous |  only valid if the previous chunk is free
//!             +-----------------------------+
//!             | head: size | C | P          |
//!     mem ->  +-----------------------------+
//!             | fd            (free only)   |
//!             | bk            (free only)   |
//!             | child[0]      (tree only)   |
//!             | child[1]      (tree only)   |
//!             | parent        (tree only)   |
//!             | index         (tree only)   |
//!             +-----------------------------+
//! ```

use crate::memory::LinearMemory;

/// The size of a word of linear memory.
pub const WORD: u32 = 4;
/// The alignment of chunks and payloads.
pub const ALIGNMENT: u32 = 8;
/// The bits that must be clear in an aligned offset.
pub const ALIGN_MASK: u32 = ALIGNMENT - 1;
/// The header preceding every payload.
pub const OVERHEAD: u32 = 2 * WORD;
/// The smallest chunk, big enough for the free list links.
pub const MIN_CHUNK_SIZE: u32 = 16;
/// Requests below this are rounded up to the minimum chunk.
pub const MIN_REQUEST: u32 = MIN_CHUNK_SIZE - OVERHEAD - 1;
/// The largest request that still fits a chunk.
pub const MAX_REQUEST: u32 = (!MIN_CHUNK_SIZE + 1) << 2;

/// The previous chunk is in use.
pub const PINUSE: u32 = 1 << 0;
/// This chunk is in use.
pub const CINUSE: u32 = 1 << 1;
/// Reserved.
pub const FLAG4: u32 = 1 << 2;
/// Both in-use bits.
pub const INUSE: u32 = PINUSE | CINUSE;
/// Every flag bit.
pub const FLAG_BITS: u32 = PINUSE | CINUSE | FLAG4;
/// The header closing off every segment.
///
/// It is in use, so coalescing never walks past the end of a segment.
pub const FENCEPOST_HEAD: u32 = OVERHEAD | CINUSE;

/// Normalize a request to a chunk size.
///
/// The request must be below `MAX_REQUEST`.
#[inline]
pub fn request2size(req: u32) -> u32 {
    if req < MIN_REQUEST {
        MIN_CHUNK_SIZE
    } else {
        (req + OVERHEAD + ALIGN_MASK) & !ALIGN_MASK
    }
}

/// Who a tree chunk hangs from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parent {
    /// Not in the tree itself, but on the same-size chain of a tree node.
    Chain,
    /// The root of its tree bin.
    Root,
    /// A child of another tree node.
    Node(Chunk),
}

impl Parent {
    /// Encode into a header word.
    ///
    /// Chunks never live at offset 0 or 1, which leaves those for the other variants.
    fn encode(self) -> u32 {
        match self {
            Parent::Chain => 0,
            Parent::Root => 1,
            Parent::Node(c) => c.0,
        }
    }

    fn decode(word: u32) -> Parent {
        match word {
            0 => Parent::Chain,
            1 => Parent::Root,
            x => Parent::Node(Chunk(x)),
        }
    }
}

/// A handle to a chunk in linear memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chunk(u32);

impl Chunk {
    /// The chunk starting at `ptr`.
    #[inline]
    pub fn at(ptr: u32) -> Chunk {
        Chunk(ptr)
    }

    /// The chunk owning the payload at `mem`.
    #[inline]
    pub fn from_mem(mem: u32) -> Chunk {
        Chunk(mem - OVERHEAD)
    }

    /// The offset of this chunk.
    #[inline]
    pub fn ptr(self) -> u32 {
        self.0
    }

    /// The payload of this chunk.
    #[inline]
    pub fn to_mem(self) -> u32 {
        self.0 + OVERHEAD
    }

    /// The chunk `n` bytes after this one.
    #[inline]
    pub fn plus(self, n: u32) -> Chunk {
        Chunk(self.0 + n)
    }

    /// The chunk `n` bytes before this one.
    #[inline]
    pub fn minus(self, n: u32) -> Chunk {
        Chunk(self.0 - n)
    }

    // Header.

    #[inline]
    pub fn head(self, m: &LinearMemory) -> u32 {
        m.read_u32(self.0 + WORD)
    }

    #[inline]
    pub fn set_head(self, m: &mut LinearMemory, head: u32) {
        m.write_u32(self.0 + WORD, head);
    }

    #[inline]
    pub fn prev_foot(self, m: &LinearMemory) -> u32 {
        m.read_u32(self.0)
    }

    #[inline]
    pub fn set_prev_foot(self, m: &mut LinearMemory, foot: u32) {
        m.write_u32(self.0, foot);
    }

    #[inline]
    pub fn size(self, m: &LinearMemory) -> u32 {
        self.head(m) & !FLAG_BITS
    }

    #[inline]
    pub fn cinuse(self, m: &LinearMemory) -> bool {
        self.head(m) & CINUSE != 0
    }

    #[inline]
    pub fn pinuse(self, m: &LinearMemory) -> bool {
        self.head(m) & PINUSE != 0
    }

    /// The chunk following this one.
    #[inline]
    pub fn next(self, m: &LinearMemory) -> Chunk {
        self.plus(self.size(m))
    }

    /// The chunk preceding this one. Only valid if `!self.pinuse()`.
    #[inline]
    pub fn prev(self, m: &LinearMemory) -> Chunk {
        self.minus(self.prev_foot(m))
    }

    #[inline]
    pub fn clear_pinuse(self, m: &mut LinearMemory) {
        let head = self.head(m);
        self.set_head(m, head & !PINUSE);
    }

    #[inline]
    pub fn clear_cinuse(self, m: &mut LinearMemory) {
        let head = self.head(m);
        self.set_head(m, head & !CINUSE);
    }

    /// Mark the chunk in use, keeping its PINUSE bit, and tell the next chunk.
    #[inline]
    pub fn set_inuse(self, m: &mut LinearMemory, size: u32) {
        let head = self.head(m);
        self.set_head(m, (head & PINUSE) | size | CINUSE);
        self.mark_next_pinuse(m, size);
    }

    /// Mark the chunk and its predecessor in use, and tell the next chunk.
    #[inline]
    pub fn set_inuse_and_pinuse(self, m: &mut LinearMemory, size: u32) {
        self.set_head(m, size | INUSE);
        self.mark_next_pinuse(m, size);
    }

    /// Mark the chunk and its predecessor in use, without touching the next chunk.
    #[inline]
    pub fn set_size_and_pinuse_of_inuse_chunk(self, m: &mut LinearMemory, size: u32) {
        self.set_head(m, size | INUSE);
    }

    /// Write the boundary tag of a free chunk.
    #[inline]
    pub fn set_foot(self, m: &mut LinearMemory, size: u32) {
        self.plus(size).set_prev_foot(m, size);
    }

    #[inline]
    pub fn set_size_and_pinuse_of_free_chunk(self, m: &mut LinearMemory, size: u32) {
        self.set_head(m, size | PINUSE);
        self.set_foot(m, size);
    }

    /// Make this a free chunk, followed by `next`.
    #[inline]
    pub fn set_free_with_pinuse(self, m: &mut LinearMemory, size: u32, next: Chunk) {
        next.clear_pinuse(m);
        self.set_size_and_pinuse_of_free_chunk(m, size);
    }

    fn mark_next_pinuse(self, m: &mut LinearMemory, size: u32) {
        let next = self.plus(size);
        let head = next.head(m);
        next.set_head(m, head | PINUSE);
    }

    // Free list links.

    #[inline]
    pub fn fd(self, m: &LinearMemory) -> Chunk {
        Chunk(m.read_u32(self.0 + 2 * WORD))
    }

    #[inline]
    pub fn set_fd(self, m: &mut LinearMemory, fd: Chunk) {
        m.write_u32(self.0 + 2 * WORD, fd.0);
    }

    #[inline]
    pub fn bk(self, m: &LinearMemory) -> Chunk {
        Chunk(m.read_u32(self.0 + 3 * WORD))
    }

    #[inline]
    pub fn set_bk(self, m: &mut LinearMemory, bk: Chunk) {
        m.write_u32(self.0 + 3 * WORD, bk.0);
    }

    // Tree links.

    #[inline]
    pub fn child(self, m: &LinearMemory, dir: u32) -> Option<Chunk> {
        debug_assert!(dir < 2);

        match m.read_u32(self.0 + (4 + dir) * WORD) {
            0 => None,
            x => Some(Chunk(x)),
        }
    }

    #[inline]
    pub fn set_child(self, m: &mut LinearMemory, dir: u32, child: Option<Chunk>) {
        debug_assert!(dir < 2);

        m.write_u32(self.0 + (4 + dir) * WORD, child.map_or(0, |c| c.0));
    }

    /// The left child if there is one, else the right one.
    #[inline]
    pub fn leftmost_child(self, m: &LinearMemory) -> Option<Chunk> {
        self.child(m, 0).or_else(|| self.child(m, 1))
    }

    #[inline]
    pub fn parent(self, m: &LinearMemory) -> Parent {
        Parent::decode(m.read_u32(self.0 + 6 * WORD))
    }

    #[inline]
    pub fn set_parent(self, m: &mut LinearMemory, parent: Parent) {
        m.write_u32(self.0 + 6 * WORD, parent.encode());
    }

    #[inline]
    pub fn index(self, m: &LinearMemory) -> u32 {
        m.read_u32(self.0 + 7 * WORD)
    }

    #[inline]
    pub fn set_index(self, m: &mut LinearMemory, index: u32) {
        m.write_u32(self.0 + 7 * WORD, index);
    }
}
