//! # Stream Utilities
//!
//! Low-level building blocks shared by the program stream parser and the
//! output handlers.
//!
//! ## Bit Cursor
//!
//! [`BitCursor`] wraps any [`std::io::Read`] source with a 4096-byte
//! lookahead window. Header fields are peeked by bit position relative to
//! the current stream offset:
//!
//! ```rust
//! use psdemux::utils::BitCursor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = [0x00u8, 0x00, 0x01, 0xE0, 0x00, 0x08];
//! let mut cursor = BitCursor::new(&data[..]);
//!
//! assert_eq!(cursor.peek_bits(24, 8), 0xE0);
//! assert_eq!(cursor.peek_bits(32, 16) + 6, 14);
//! cursor.set_offset(6)?;
//! assert_eq!(cursor.offset(), 6);
//! # Ok(())
//! # }
//! ```
//!
//! ## Staging Buffer
//!
//! [`StagingBuffer`] holds one unit read from the cursor so it can be
//! patched and written out in a single call.

/// Bit-field peeking over a buffered byte source
pub mod bits;

/// Growable staging buffer for whole units
pub mod buffer;

pub use bits::*;
pub use buffer::StagingBuffer;
