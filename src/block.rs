//! Memory blocks.
//!
//! Blocks are the unit linear memory is handed out in by the program break, and what the segment
//! list is made of. A block is a simple construct with an offset and a size. Unlike chunks, blocks
//! carry no header; they only describe a span.

use core::{cmp, fmt};

/// A contiguous span of linear memory.
///
/// This provides a number of guarantees,
///
/// 1. The span never wraps around the 32-bit address space.
/// 2. No byte in the block is contained in another live block.
#[derive(Clone, Copy)]
pub struct Block {
    /// The offset of the start of this block.
    ptr: u32,
    /// The size of this block, in bytes.
    size: u32,
}

impl Block {
    /// Construct a block from its raw parts (offset and size).
    ///
    /// # Panics
    ///
    /// Panics if the block would wrap around the address space.
    #[inline]
    pub fn from_raw_parts(ptr: u32, size: u32) -> Block {
        assert!(ptr.checked_add(size).is_some(), "Block 0x{:x}[0x{:x}] wraps around.", ptr, size);

        Block { ptr, size }
    }

    /// Create an empty block starting at `ptr`.
    #[inline]
    pub fn empty(ptr: u32) -> Block {
        Block { ptr, size: 0 }
    }

    /// Is this block empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Get the size of the block.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Get the offset of the start of the block.
    #[inline]
    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    /// Get the offset one past the end of the block.
    #[inline]
    pub fn end(&self) -> u32 {
        // Guaranteed not to overflow by the constructor.
        self.ptr + self.size
    }

    /// Does this block contain the byte at `ptr`?
    #[inline]
    pub fn holds(&self, ptr: u32) -> bool {
        self.ptr <= ptr && ptr < self.end()
    }

    /// Is this block placed left to the given other block?
    #[inline]
    pub fn left_to(&self, to: &Block) -> bool {
        self.end() == to.ptr
    }

    /// Merge this block with a block to the right.
    ///
    /// This will simply extend the block, adding the size of the block, and then set the size to
    /// zero. The return value is `Ok(())` on success, and `Err(())` on failure (e.g., the blocks
    /// are not adjacent).
    ///
    /// If you merge with a zero sized block, it will succeed, even if they are not adjacent.
    #[inline]
    pub fn merge_right(&mut self, block: &mut Block) -> Result<(), ()> {
        if block.is_empty() {
            Ok(())
        } else if self.left_to(block) {
            // Since the end of `block` is bounded by the address space, adding them cannot
            // overflow.
            self.size += block.size;
            // We empty it to make sure it isn't aliased.
            *block = Block::empty(block.end());

            Ok(())
        } else {
            Err(())
        }
    }

    /// Split the block at some position.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is out of bound.
    #[inline]
    pub fn split(self, pos: u32) -> (Block, Block) {
        assert!(pos <= self.size, "Split {} out of bound (size is {})!", pos, self.size);

        (
            Block {
                size: pos,
                ptr: self.ptr,
            },
            Block {
                size: self.size - pos,
                ptr: self.ptr + pos,
            },
        )
    }
}

impl PartialOrd for Block {
    #[inline]
    fn partial_cmp(&self, other: &Block) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare the blocks address.
impl Ord for Block {
    #[inline]
    fn cmp(&self, other: &Block) -> cmp::Ordering {
        self.ptr.cmp(&other.ptr).then(self.size.cmp(&other.size))
    }
}

impl cmp::PartialEq for Block {
    #[inline]
    fn eq(&self, other: &Block) -> bool {
        self.size == other.size && self.ptr == other.ptr
    }
}

impl cmp::Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}[0x{:x}]", self.ptr, self.size)
    }
}
