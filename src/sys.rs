//! Host primitives.
//!
//! Linear memory does not grow by itself: the host environment decides whether the backing
//! buffer may be extended, and by how much. This module defines that boundary.

use core::cmp;

use shim::config;

use crate::error::GrowError;

/// The host side of linear memory growth.
///
/// This is the "extend memory" hook. It is only ever asked to grow the buffer, never to move
/// it, so offsets handed out earlier stay valid.
pub trait Host: Send {
    /// Grow linear memory from `current` bytes to at least `required` bytes.
    ///
    /// On success, the new size of linear memory is returned. It must be at least `required`.
    fn grow(&mut self, current: u32, required: u32) -> Result<u32, GrowError>;
}

/// A host which never grows memory.
///
/// This is the fixed-capacity configuration: every growth request fails, and allocations which
/// cannot be served by the existing memory return the failure sentinel.
#[derive(Copy, Clone, Debug, Default)]
pub struct Fixed;

impl Host for Fixed {
    fn grow(&mut self, current: u32, _required: u32) -> Result<u32, GrowError> {
        Err(GrowError::Fixed { capacity: current })
    }
}

/// A host which grows memory in whole pages, up to a ceiling.
#[derive(Copy, Clone, Debug)]
pub struct Growable {
    /// The size linear memory will never exceed.
    maximum: u32,
}

impl Growable {
    /// Create a growable host with some memory ceiling.
    pub fn new(maximum: u32) -> Growable {
        Growable { maximum }
    }

    /// The memory ceiling.
    pub fn maximum(&self) -> u32 {
        self.maximum
    }
}

impl Host for Growable {
    fn grow(&mut self, current: u32, required: u32) -> Result<u32, GrowError> {
        if required > self.maximum {
            log!(WARNING, "Growth to {} bytes exceeds the ceiling of {}.", required, self.maximum);

            return Err(GrowError::Ceiling {
                requested: required as u64,
                maximum: self.maximum,
            });
        }

        // Round up to whole pages. Near the top of the address space the rounding itself may
        // overflow, in which case the ceiling is the best we can do.
        let paged = required
            .checked_add(config::PAGE_SIZE - 1)
            .map_or(self.maximum, |x| x & !(config::PAGE_SIZE - 1));
        let new = cmp::min(paged, self.maximum);

        log!(NOTE, "Growing linear memory from {} to {} bytes.", current, new);

        Ok(new)
    }
}

/// Closures make ad-hoc hosts.
impl<F> Host for F
where
    F: FnMut(u32, u32) -> Result<u32, GrowError> + Send,
{
    fn grow(&mut self, current: u32, required: u32) -> Result<u32, GrowError> {
        self(current, required)
    }
}
