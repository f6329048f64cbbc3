//! Error types.

use thiserror::Error;

/// Why linear memory could not be grown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum GrowError {
    /// The host runs in fixed-capacity mode.
    #[error("linear memory is fixed at {capacity} bytes")]
    Fixed {
        /// The size linear memory is stuck at.
        capacity: u32,
    },
    /// Growing would pass the configured memory ceiling.
    #[error("growing linear memory to {requested} bytes exceeds the {maximum} byte ceiling")]
    Ceiling {
        /// The size that was asked for.
        requested: u64,
        /// The ceiling.
        maximum: u32,
    },
    /// The request does not fit the 32-bit address space.
    #[error("linear memory growth overflows the address space")]
    Overflow,
    /// The host declined without further explanation.
    #[error("the host refused to grow linear memory")]
    Refused,
}

/// Why an allocation failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum AllocError {
    /// No chunk of this size can ever exist.
    #[error("a request of {0} bytes exceeds the largest possible chunk")]
    TooLarge(u32),
    /// Memory grew, but still no chunk could hold the request.
    #[error("no chunk can hold a request of {0} bytes")]
    Exhausted(u32),
    /// Linear memory could not be grown.
    #[error("out of memory")]
    Grow(#[from] GrowError),
}

impl AllocError {
    /// Is this an out-of-memory condition (as opposed to a malformed request)?
    pub fn is_oom(&self) -> bool {
        !matches!(*self, AllocError::TooLarge(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_oom_classification() {
        assert!(!AllocError::TooLarge(7).is_oom());
        assert!(AllocError::Exhausted(7).is_oom());
        assert!(AllocError::from(GrowError::Fixed { capacity: 64 }).is_oom());
    }
}
