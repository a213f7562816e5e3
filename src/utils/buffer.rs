use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

use bytes::BytesMut;

use crate::error::Result;
use crate::utils::BitCursor;

/// A growable byte buffer that stages one unit read from the stream until
/// it is written out.
///
/// The used length and the capacity are tracked separately. Capacity only
/// grows, so a buffer reused across packets stops allocating once it has
/// seen the largest unit.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    buf: BytesMut,
}

impl StagingBuffer {
    /// Creates an empty buffer without allocating.
    pub fn new() -> Self {
        StagingBuffer {
            buf: BytesMut::new(),
        }
    }

    /// Creates an empty buffer able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        StagingBuffer {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes in use.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if no bytes are in use.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Grows capacity to at least `n` bytes without touching the contents.
    pub fn ensure_capacity(&mut self, n: usize) {
        if n > self.buf.capacity() {
            self.buf.reserve(n - self.buf.len());
        }
    }

    /// Sets the used length to `n`, zero-filling any newly exposed bytes.
    pub fn set_len(&mut self, n: usize) {
        self.ensure_capacity(n);
        self.buf.resize(n, 0);
    }

    /// Empties the buffer, keeping its capacity.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Replaces the contents with the next `n` bytes of the stream.
    ///
    /// Returns how many bytes were actually read; the used length is
    /// truncated to that count.
    pub fn fill_from<R: Read>(&mut self, cursor: &mut BitCursor<R>, n: usize) -> Result<usize> {
        self.set_len(n);
        let got = cursor.read(&mut self.buf[..])?;
        self.buf.truncate(got);
        Ok(got)
    }

    /// Writes the used bytes to `sink` and empties the buffer.
    ///
    /// The buffer is emptied even if the write fails.
    pub fn flush_and_clear<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<()> {
        let result = if self.buf.is_empty() {
            Ok(())
        } else {
            sink.write_all(&self.buf)
        };
        self.buf.clear();
        Ok(result?)
    }
}

impl Deref for StagingBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for StagingBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_capacity_only_grows() {
        let mut buf = StagingBuffer::new();
        buf.ensure_capacity(100);
        let cap = buf.capacity();
        assert!(cap >= 100);

        buf.ensure_capacity(10);
        assert_eq!(buf.capacity(), cap);
        assert!(buf.is_empty());

        buf.set_len(50);
        assert_eq!(buf.len(), 50);
        buf.clear();
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn test_set_len_zero_fills() {
        let mut buf = StagingBuffer::with_capacity(4);
        buf.set_len(3);
        buf[1] = 0xAA;
        buf.set_len(6);
        assert_eq!(&buf[..], &[0, 0xAA, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fill_from_short_read() {
        let data = [1u8, 2, 3, 4, 5];
        let mut cursor = BitCursor::new(&data[..]);
        let mut buf = StagingBuffer::new();

        assert_eq!(buf.fill_from(&mut cursor, 3).unwrap(), 3);
        assert_eq!(&buf[..], &[1, 2, 3]);

        assert_eq!(buf.fill_from(&mut cursor, 10).unwrap(), 2);
        assert_eq!(&buf[..], &[4, 5]);
        assert_eq!(cursor.offset(), 5);
    }

    #[test]
    fn test_flush_and_clear() {
        let mut buf = StagingBuffer::new();
        buf.set_len(2);
        buf.copy_from_slice(b"ok");

        let mut out = Vec::new();
        buf.flush_and_clear(&mut out).unwrap();
        assert_eq!(out, b"ok".to_vec());
        assert!(buf.is_empty());

        // Empty buffers write nothing
        buf.flush_and_clear(&mut out).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_flush_failure_still_clears() {
        let mut buf = StagingBuffer::new();
        buf.set_len(4);
        assert!(buf.flush_and_clear(&mut BrokenSink).is_err());
        assert!(buf.is_empty());
    }
}
