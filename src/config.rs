//! Runtime configuration.
//!
//! The compile-time knobs live in `linalloc_shim::config`; this is what may differ between
//! allocators in the same program.

use alloc::boxed::Box;

use shim::config;

use crate::sys::{Fixed, Growable, Host};

/// The configuration of an allocator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The size linear memory starts out with.
    pub initial_memory: u32,
    /// The size linear memory may grow to. `None` means it never grows.
    pub maximum_memory: Option<u32>,
    /// The size of the static area at the bottom of linear memory, which the heap never touches.
    pub static_reserve: u32,
    /// Give the tail of the top chunk back once it grows past this.
    pub trim_threshold: u32,
    /// Call the OOM handler instead of returning the failure sentinel when memory cannot grow.
    pub abort_on_oom: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            initial_memory: config::DEFAULT_INITIAL_MEMORY,
            maximum_memory: None,
            static_reserve: config::DEFAULT_STATIC_RESERVE,
            trim_threshold: config::DEFAULT_TRIM_THRESHOLD,
            abort_on_oom: false,
        }
    }
}

impl Config {
    /// Fixed-capacity linear memory of `capacity` bytes.
    pub fn fixed(capacity: u32) -> Config {
        Config {
            initial_memory: capacity,
            ..Config::default()
        }
    }

    /// Linear memory starting at `initial` bytes, growing up to `maximum` bytes.
    pub fn growable(initial: u32, maximum: u32) -> Config {
        Config {
            initial_memory: initial,
            maximum_memory: Some(maximum),
            ..Config::default()
        }
    }

    /// Is linear memory allowed to grow?
    pub fn is_growable(&self) -> bool {
        self.maximum_memory.is_some()
    }

    /// The host matching this configuration.
    pub(crate) fn host(&self) -> Box<dyn Host> {
        match self.maximum_memory {
            None => Box::new(Fixed),
            Some(maximum) => Box::new(Growable::new(maximum)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_constructors() {
        let fixed = Config::fixed(1 << 16);
        assert_eq!(fixed.initial_memory, 1 << 16);
        assert!(!fixed.is_growable());
        assert_eq!(fixed.static_reserve, config::DEFAULT_STATIC_RESERVE);

        let growable = Config::growable(0, 1 << 20);
        assert_eq!(growable.maximum_memory, Some(1 << 20));
        assert!(growable.is_growable());
    }
}
