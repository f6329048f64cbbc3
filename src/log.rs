//! Allocator logging.
//!
//! This allows for detailed logging for `linalloc`, through the `log` facade.

/// Log to the appropriate source.
///
/// The first argument is the level (`INTERNAL`, `DEBUG`, `NOTE`, `WARNING` or `ERROR`).
///
/// A bookkeeper can be given in front, in the form `bk; LEVEL`, which is used to print the state
/// of its bins and top chunk in front of the message.
///
/// The rest of the arguments are just normal formatters.
macro_rules! log {
    ($lv:ident, $( $arg:expr ),+ $(,)?) => {{
        #[cfg(feature = "log")]
        {
            ::log::log!(target: "linalloc", $crate::log::internal::$lv, $( $arg ),+);
        }
        // Keep the arguments used without the facade.
        #[cfg(not(feature = "log"))]
        {
            if false {
                let _ = ($( &$arg, )+);
            }
        }
    }};
    ($bk:expr; $lv:ident, $( $arg:expr ),+ $(,)?) => {{
        #[cfg(feature = "log")]
        {
            if ::log::log_enabled!(target: "linalloc", $crate::log::internal::$lv) {
                ::log::log!(
                    target: "linalloc",
                    $crate::log::internal::$lv,
                    "{:?} : {}",
                    $bk.logger(),
                    format_args!($( $arg ),+)
                );
            }
        }
        #[cfg(not(feature = "log"))]
        {
            if false {
                let _ = (&$bk, $( &$arg, )+);
            }
        }
    }};
}

/// Top secret place-holding module.
#[cfg(feature = "log")]
pub mod internal {
    use core::fmt;

    use ::log::Level;

    /// Chatter about the inner workings of a single operation.
    pub const INTERNAL: Level = Level::Trace;
    /// Operations on the bookkeeper.
    pub const DEBUG: Level = Level::Debug;
    /// Rare events, such as growing memory.
    pub const NOTE: Level = Level::Info;
    /// Something failed, but the caller is told about it.
    pub const WARNING: Level = Level::Warn;
    /// Something failed, and nobody can be told.
    pub const ERROR: Level = Level::Error;

    /// A "bin logger".
    ///
    /// This intends to show the occupancy of the bins. The syntax used is like:
    ///
    /// ```notrust
    /// __xx_x__________________________|x_______________________________ top 0x408+0xfbf0
    /// ```
    ///
    /// where `x` denotes a non-empty bin and `_` an empty one. The small bins come first, then the
    /// tree bins, delimited by `|`.
    pub struct BinLogger {
        /// The small bin map.
        pub smallmap: u32,
        /// The tree bin map.
        pub treemap: u32,
        /// The top chunk and its size, if any.
        pub top: Option<(u32, u32)>,
    }

    impl fmt::Debug for BinLogger {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            for (n, map) in [self.smallmap, self.treemap].iter().enumerate() {
                if n != 0 {
                    write!(f, "|")?;
                }

                for i in 0..32 {
                    if map & (1 << i) != 0 {
                        // Non-empty bin.
                        write!(f, "x")?;
                    } else {
                        // Empty bin.
                        write!(f, "_")?;
                    }
                }
            }

            match self.top {
                Some((top, size)) => write!(f, " top 0x{:x}+0x{:x}", top, size),
                None => write!(f, " no top"),
            }
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn test_bin_logger() {
            let logger = BinLogger {
                smallmap: 0b101,
                treemap: 1 << 31,
                top: Some((0x408, 0x10)),
            };
            let out = format!("{:?}", logger);

            assert!(out.starts_with("x_x_____"));
            assert!(out.contains("_x top 0x408+0x10"));
            assert_eq!(out.matches('x').count(), 3 + 2);
        }
    }
}
