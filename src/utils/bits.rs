use std::io::{self, Read, Write};

use crate::error::{PsError, Result};

/// Capacity of the lookahead window kept in front of the stream position.
pub const WINDOW_SIZE: usize = 4096;

/// A forward-only byte cursor over a sequential source with a bounded
/// lookahead window.
///
/// Headers are decoded by peeking bit fields relative to the current
/// position without consuming anything. Bytes are consumed only through
/// [`skip`](BitCursor::skip), [`read`](BitCursor::read) and
/// [`set_offset`](BitCursor::set_offset), which keep the absolute offset in
/// step with the number of bytes actually taken from the source.
///
/// Example:
/// ```
/// use psdemux::utils::BitCursor;
///
/// let data = [0x00u8, 0x00, 0x01, 0xBA, 0x44];
/// let mut cursor = BitCursor::new(&data[..]);
///
/// assert_eq!(cursor.peek_bits(0, 24), 1);
/// assert_eq!(cursor.peek_bits(32, 2), 0b01);
/// cursor.skip(4).unwrap();
/// assert_eq!(cursor.offset(), 4);
/// ```
pub struct BitCursor<R> {
    source: R,
    offset: u64,
    window: Box<[u8]>,
    head: usize,
    len: usize,
    error: Option<io::Error>,
}

impl<R: Read> BitCursor<R> {
    /// Creates a cursor positioned at offset 0 of `source`.
    pub fn new(source: R) -> Self {
        BitCursor {
            source,
            offset: 0,
            window: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
            head: 0,
            len: 0,
            error: None,
        }
    }

    /// Absolute position of the window head in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes currently buffered ahead of the position.
    pub fn available(&self) -> usize {
        self.len
    }

    /// Returns true once the window is empty and the source yields no more data.
    pub fn is_exhausted(&mut self) -> bool {
        if self.len == 0 {
            self.fill();
        }
        self.len == 0
    }

    /// Takes the read error that stopped the last refill, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Consumes the cursor, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }

    // Compacts the window and tops it up to capacity or until the source ends.
    fn fill(&mut self) {
        if self.head > 0 {
            self.window.copy_within(self.head..self.head + self.len, 0);
            self.head = 0;
        }

        while self.len < WINDOW_SIZE && self.error.is_none() {
            match self.source.read(&mut self.window[self.len..]) {
                Ok(0) => break,
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("read error at offset {}: {}", self.offset + self.len as u64, e);
                    self.error = Some(e);
                }
            }
        }
    }

    /// Peeks `width` bits (at most 32) starting `bit_offset` bits past the
    /// current position, interpreted big-endian.
    ///
    /// Returns 0 if the source cannot supply enough bytes to cover the field.
    /// Never consumes input.
    pub fn peek_bits(&mut self, bit_offset: usize, width: u32) -> u32 {
        debug_assert!(width <= 32);

        let needed = (bit_offset + width as usize + 7) / 8;
        if needed > self.len {
            self.fill();
            if needed > self.len {
                return 0;
            }
        }

        let buf = &self.window[self.head..self.head + self.len];

        if (bit_offset | width as usize) & 7 == 0 {
            let start = bit_offset / 8;
            return buf[start..start + width as usize / 8]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        }

        let mut value = 0u32;
        let mut pos = bit_offset;
        let mut remaining = width;
        while remaining > 0 {
            let avail = 8 - (pos & 7) as u32;
            let take = avail.min(remaining);
            let bits = (u32::from(buf[pos >> 3]) >> (avail - take)) & ((1u32 << take) - 1);
            value = (value << take) | bits;
            pos += take as usize;
            remaining -= take;
        }

        value
    }

    /// Consumes `n` bytes: buffered bytes first, then directly from the source.
    ///
    /// Fails with [`PsError::Truncated`] if the source ends first; the offset
    /// still reflects every byte that was consumed.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        let buffered = self.len as u64;
        if n <= buffered {
            self.head += n as usize;
            self.len -= n as usize;
            self.offset += n;
            return Ok(());
        }

        self.offset += buffered;
        self.head = 0;
        self.len = 0;

        let mut remaining = n - buffered;
        while remaining > 0 {
            let chunk = remaining.min(WINDOW_SIZE as u64) as usize;
            match self.source.read(&mut self.window[..chunk]) {
                Ok(0) => return Err(PsError::Truncated),
                Ok(r) => {
                    self.offset += r as u64;
                    remaining -= r as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Reads up to `dst.len()` bytes, buffered bytes first.
    ///
    /// Returns the number of bytes actually read, which is short only when
    /// the source ended.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let buffered = dst.len().min(self.len);
        dst[..buffered].copy_from_slice(&self.window[self.head..self.head + buffered]);
        self.head += buffered;
        self.len -= buffered;

        let mut count = buffered;
        while count < dst.len() {
            match self.source.read(&mut dst[count..]) {
                Ok(0) => break,
                Ok(r) => count += r,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.offset += count as u64;
                    return Err(e.into());
                }
            }
        }

        self.offset += count as u64;
        Ok(count)
    }

    /// Moves forward to the absolute position `target`.
    ///
    /// Equal positions are a no-op. Moving backwards is not supported.
    pub fn set_offset(&mut self, target: u64) -> Result<()> {
        if target == self.offset {
            return Ok(());
        }
        if target < self.offset {
            return Err(PsError::BackwardSeek {
                current: self.offset,
                target,
            });
        }
        self.skip(target - self.offset)
    }

    /// Copies `n` bytes from the stream into `sink`.
    ///
    /// Whatever was read is written before a short read is reported as
    /// [`PsError::Truncated`].
    pub fn copy_to<W: Write + ?Sized>(&mut self, sink: &mut W, n: u64) -> Result<()> {
        let mut chunk = [0u8; WINDOW_SIZE];
        let mut remaining = n;

        while remaining > 0 {
            let want = remaining.min(WINDOW_SIZE as u64) as usize;
            let got = self.read(&mut chunk[..want])?;
            sink.write_all(&chunk[..got])?;
            if got != want {
                return Err(PsError::Truncated);
            }
            remaining -= want as u64;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_peek_bits() {
        let data = [0b1011_0011u8, 0b0101_1010, 0xFF, 0x00];
        let mut cursor = BitCursor::new(&data[..]);

        assert_eq!(cursor.peek_bits(0, 3), 0b101);
        assert_eq!(cursor.peek_bits(3, 5), 0b10011);
        assert_eq!(cursor.peek_bits(3, 8), 0b1001_1010);
        assert_eq!(cursor.peek_bits(0, 16), 0b1011_0011_0101_1010);
        assert_eq!(cursor.peek_bits(0, 32), 0xB35A_FF00);
        assert_eq!(cursor.peek_bits(12, 0), 0);

        // Peeking never consumes
        assert_eq!(cursor.offset(), 0);
        assert_eq!(cursor.peek_bits(0, 3), 0b101);
    }

    #[test]
    fn test_peek_past_end_returns_zero() {
        let data = [0x00u8, 0x00, 0x01];
        let mut cursor = BitCursor::new(&data[..]);

        assert_eq!(cursor.peek_bits(0, 24), 1);
        assert_eq!(cursor.peek_bits(0, 32), 0);
        assert_eq!(cursor.peek_bits(20, 5), 0);
    }

    #[test]
    fn test_skip_within_and_beyond_window() {
        let data = pattern(3 * WINDOW_SIZE + 17);
        let mut cursor = BitCursor::new(&data[..]);

        assert_eq!(cursor.peek_bits(0, 8), u32::from(data[0]));
        cursor.skip(10).unwrap();
        assert_eq!(cursor.offset(), 10);
        assert_eq!(cursor.peek_bits(0, 8), u32::from(data[10]));

        cursor.skip(2 * WINDOW_SIZE as u64 + 5).unwrap();
        let pos = 2 * WINDOW_SIZE + 15;
        assert_eq!(cursor.offset(), pos as u64);
        assert_eq!(cursor.peek_bits(0, 16), u32::from(data[pos]) << 8 | u32::from(data[pos + 1]));
    }

    #[test]
    fn test_skip_past_end_fails() {
        let data = pattern(100);
        let mut cursor = BitCursor::new(&data[..]);

        cursor.peek_bits(0, 8);
        assert!(matches!(cursor.skip(150), Err(PsError::Truncated)));
        assert_eq!(cursor.offset(), 100);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_read_mixes_window_and_source() {
        let data = pattern(WINDOW_SIZE + 500);
        let mut cursor = BitCursor::new(&data[..]);

        cursor.peek_bits(0, 8);
        cursor.skip(100).unwrap();

        let mut out = vec![0u8; WINDOW_SIZE];
        let got = cursor.read(&mut out).unwrap();
        assert_eq!(got, WINDOW_SIZE);
        assert_eq!(&out[..], &data[100..100 + WINDOW_SIZE]);
        assert_eq!(cursor.offset(), (100 + WINDOW_SIZE) as u64);

        let mut rest = vec![0u8; 1000];
        let got = cursor.read(&mut rest).unwrap();
        assert_eq!(got, 400);
        assert_eq!(&rest[..got], &data[100 + WINDOW_SIZE..]);
        assert_eq!(cursor.offset(), data.len() as u64);
    }

    #[test]
    fn test_set_offset() {
        let data = pattern(64);
        let mut cursor = BitCursor::new(&data[..]);

        cursor.set_offset(0).unwrap();
        cursor.set_offset(20).unwrap();
        assert_eq!(cursor.offset(), 20);
        cursor.set_offset(20).unwrap();

        match cursor.set_offset(19) {
            Err(PsError::BackwardSeek { current, target }) => {
                assert_eq!(current, 20);
                assert_eq!(target, 19);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(cursor.offset(), 20);
    }

    #[test]
    fn test_trickling_source_refills() {
        let data = pattern(300);
        let mut cursor = BitCursor::new(Trickle { data: &data, step: 3 });

        assert_eq!(cursor.peek_bits(8 * 250, 8), u32::from(data[250]));
        cursor.skip(299).unwrap();
        assert_eq!(cursor.peek_bits(0, 8), u32::from(data[299]));
        assert_eq!(cursor.peek_bits(0, 16), 0);
    }

    #[test]
    fn test_copy_to() {
        let data = pattern(2 * WINDOW_SIZE + 3);
        let mut cursor = BitCursor::new(&data[..]);
        let mut out = Vec::new();

        cursor.copy_to(&mut out, 5000).unwrap();
        assert_eq!(&out[..], &data[..5000]);

        out.clear();
        assert!(matches!(cursor.copy_to(&mut out, 5000), Err(PsError::Truncated)));
        assert_eq!(&out[..], &data[5000..]);
        assert_eq!(cursor.offset(), data.len() as u64);
    }

    #[test]
    fn test_read_error_is_kept() {
        let data = [0x00u8, 0x00];
        let mut cursor = BitCursor::new(Failing { data: &data });

        assert_eq!(cursor.peek_bits(0, 24), 0);
        assert!(cursor.take_error().is_some());
        assert!(cursor.take_error().is_none());
    }

    #[quickcheck]
    fn prop_peek_matches_manual(data: Vec<u8>, bit_offset: u16, width: u8) -> bool {
        let bit_offset = bit_offset as usize % 64;
        let width = u32::from(width % 33);

        let mut cursor = BitCursor::new(&data[..]);
        let result = cursor.peek_bits(bit_offset, width);

        if bit_offset + width as usize > data.len() * 8 {
            return result == 0;
        }

        let mut expected = 0u32;
        for i in 0..width as usize {
            let pos = bit_offset + i;
            let bit = (data[pos / 8] >> (7 - pos % 8)) & 1;
            expected = (expected << 1) | u32::from(bit);
        }
        result == expected
    }

    #[quickcheck]
    fn prop_offset_counts_consumed_bytes(data: Vec<u8>, steps: Vec<(bool, u8)>) -> bool {
        let mut cursor = BitCursor::new(&data[..]);
        let mut consumed = 0u64;

        for (use_read, n) in steps {
            if use_read {
                let mut buf = vec![0u8; n as usize];
                match cursor.read(&mut buf) {
                    Ok(got) => consumed += got as u64,
                    Err(_) => return false,
                }
            } else {
                let left = data.len() as u64 - consumed;
                match cursor.skip(u64::from(n)) {
                    Ok(()) => consumed += u64::from(n),
                    Err(PsError::Truncated) => consumed += left,
                    Err(_) => return false,
                }
            }
            if cursor.offset() != consumed {
                return false;
            }
        }
        true
    }
}
