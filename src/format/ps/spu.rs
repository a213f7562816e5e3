use std::io::{Read, Write};

use crate::error::{PsError, Result};
use crate::utils::BitCursor;

/// Re-frames a DVD subtitle substream so that every subtitle unit is
/// preceded by the 8-byte big-endian PTS of the packet it starts in.
///
/// Units span packets, so the number of unit bytes still owed and whether
/// the unit's 2-byte length was split across a packet boundary are carried
/// from one packet to the next.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubtitleRepacketizer {
    remaining: u32,
    half_length: bool,
}

impl SubtitleRepacketizer {
    /// Creates a re-packetizer positioned at the start of a unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the current unit not yet copied.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// True if only the first byte of the next unit's length has been seen.
    pub fn is_half_length(&self) -> bool {
        self.half_length
    }

    fn read_exact<R: Read>(cursor: &mut BitCursor<R>, buf: &mut [u8]) -> Result<()> {
        if cursor.read(buf)? != buf.len() {
            return Err(PsError::Truncated);
        }
        Ok(())
    }

    /// Copies `count` payload bytes of one packet from `cursor` to `sink`.
    pub fn copy<R: Read, W: Write + ?Sized>(
        &mut self,
        cursor: &mut BitCursor<R>,
        pts: u64,
        sink: &mut W,
        mut count: usize,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        if self.half_length {
            let mut low = [0u8; 1];
            Self::read_exact(cursor, &mut low)?;
            sink.write_all(&low)?;

            let len = (self.remaining << 8) | u32::from(low[0]);
            self.half_length = false;
            if len < 2 {
                return Err(PsError::SubtitleLength(len));
            }
            self.remaining = len - 2;
            count -= 1;
        }

        while count > 0 {
            if self.remaining == 0 {
                sink.write_all(&pts.to_be_bytes())?;

                if count == 1 {
                    let mut high = [0u8; 1];
                    Self::read_exact(cursor, &mut high)?;
                    sink.write_all(&high)?;
                    self.remaining = u32::from(high[0]);
                    self.half_length = true;
                    return Ok(());
                }

                let mut len = [0u8; 2];
                Self::read_exact(cursor, &mut len)?;
                sink.write_all(&len)?;

                let len = u32::from(u16::from_be_bytes(len));
                if len < 2 {
                    return Err(PsError::SubtitleLength(len));
                }
                self.remaining = len - 2;
                count -= 2;
            }

            let n = count.min(self.remaining as usize);
            cursor.copy_to(sink, n as u64)?;
            count -= n;
            self.remaining -= n as u32;
        }

        Ok(())
    }
}
