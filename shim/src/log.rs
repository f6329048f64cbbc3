//! Fatal path logging.
//!
//! The allocator's regular diagnostics go through the `log` facade. This writer exists for the
//! moments where that is no longer an option: it formats into a stack buffer and writes the
//! bytes straight to the log target.

use core::{cmp, fmt};

use crate::config;

/// Write to the log.
///
/// Messages longer than the buffer are cut short and end in "...".
pub fn write(lv: u8, kind: &str, args: fmt::Arguments, file: &str, line: u32) {
    if lv >= config::MIN_LOG_LEVEL {
        // The buffer. We add three extra slots, which are reserved for overflows. If the buffer is
        // filled, we will insert "..." to inform the user that there is more in this message. We
        // start out with all dots, so we don't have to set these up later on.
        let mut buffer = [b'.'; config::LOG_BUFFER_SIZE + 4];

        // The bytes of the buffer that are filled.
        let mut filled;

        {
            let mut writer = BufWriter {
                buffer: &mut buffer[..config::LOG_BUFFER_SIZE],
                filled: 0,
            };
            // A full buffer is not an error, we simply stop writing.
            let _ = fmt::write(&mut writer, format_args!("{:10}{} (@ {}:{})", kind, args, file, line));
            filled = writer.filled;
        }

        // Keep the dots if the buffer was full.
        if filled == config::LOG_BUFFER_SIZE {
            filled += 3;
        }

        buffer[filled] = b'\n';
        emit(&buffer[..filled + 1]);
    }
}

/// Write raw bytes to the log target.
#[cfg(unix)]
fn emit(bytes: &[u8]) {
    unsafe {
        // LAST AUDIT: 2026-10-19.

        // The pointer and length come from a live slice.
        libc::write(config::LOG_TARGET, bytes.as_ptr() as *const libc::c_void, bytes.len());
    }
}

/// Write raw bytes to the log target.
///
/// There is no target without libc.
#[cfg(not(unix))]
fn emit(_bytes: &[u8]) {}

/// A logging buffer.
///
/// This simply keeps track of the buffer and how much of it has been written.
struct BufWriter<'a> {
    /// The whole buffer.
    buffer: &'a mut [u8],
    /// The number of bytes written so far.
    filled: usize,
}

impl<'a> fmt::Write for BufWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Find the appropriate length of the copied subbuffer.
        let amt = cmp::min(s.len(), self.buffer.len() - self.filled);
        self.buffer[self.filled..self.filled + amt].copy_from_slice(&s.as_bytes()[..amt]);
        self.filled += amt;

        if amt < s.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use core::fmt::Write;

    #[test]
    fn test_buf_writer_truncates() {
        let mut buffer = [0; 4];
        let mut writer = BufWriter {
            buffer: &mut buffer,
            filled: 0,
        };

        assert!(writer.write_str("ab").is_ok());
        assert!(writer.write_str("cdef").is_err());
        assert_eq!(writer.filled, 4);
        assert_eq!(&buffer, b"abcd");
    }
}
