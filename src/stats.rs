//! Heap statistics.

use core::fmt;

/// A snapshot of the heap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Bytes of linear memory owned by the heap.
    pub footprint: u32,
    /// The highest footprint so far.
    pub max_footprint: u32,
    /// The number of segments.
    pub segments: u32,
    /// Bytes in chunks handed out, headers included.
    pub used_bytes: u32,
    /// The number of chunks handed out.
    pub used_chunks: u32,
    /// Bytes in free chunks, not counting the top chunk.
    pub free_bytes: u32,
    /// The number of free chunks, not counting the top chunk.
    pub free_chunks: u32,
    /// The size of the top chunk.
    pub top_size: u32,
}

impl Stats {
    /// Bytes that could be handed out without growing the heap.
    pub fn unused(&self) -> u32 {
        self.free_bytes + self.top_size
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "max footprint = {:>10}", self.max_footprint)?;
        writeln!(f, "footprint     = {:>10} in {} segment(s)", self.footprint, self.segments)?;
        writeln!(f, "in use        = {:>10} in {} chunk(s)", self.used_bytes, self.used_chunks)?;
        writeln!(f, "free          = {:>10} in {} chunk(s)", self.free_bytes, self.free_chunks)?;
        write!(f, "top           = {:>10}", self.top_size)
    }
}
