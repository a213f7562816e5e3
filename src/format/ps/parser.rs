use std::io::Read;

use super::pes::{parse_mpeg1_extension, parse_mpeg2_extension, MAX_STUFFING_BYTES};
use super::types::*;
use crate::error::{PsError, Result};
use crate::format::Handler;
use crate::utils::BitCursor;

/// Single-pass program stream parser.
///
/// The parser owns the cursor and the records of the most recently decoded
/// pack, system header and packet. Handlers receive the parser at every
/// checkpoint and read those records, the running [`Statistics`] and, when
/// they copy data, the cursor itself.
pub struct PsParser<R> {
    cursor: BitCursor<R>,
    /// Last decoded pack header.
    pub pack: PackRecord,
    /// Last decoded system header.
    pub system_header: SystemHeaderRecord,
    /// Last decoded packet header.
    pub packet: PacketRecord,
    /// Counters for the run so far.
    pub stats: Statistics,
}

impl<R: Read> PsParser<R> {
    /// Creates a parser reading from `source`.
    pub fn new(source: R) -> Self {
        PsParser {
            cursor: BitCursor::new(source),
            pack: PackRecord::default(),
            system_header: SystemHeaderRecord::default(),
            packet: PacketRecord::default(),
            stats: Statistics::new(),
        }
    }

    /// Absolute offset of the unit being handled.
    pub fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Cursor over the input, for handlers that consume unit bytes.
    pub fn cursor_mut(&mut self) -> &mut BitCursor<R> {
        &mut self.cursor
    }

    /// Parses the whole source, dispatching every unit to `handler`.
    ///
    /// Returns `Ok` once the input is exhausted while looking for a start
    /// code. Handler failures and read errors abort the run.
    pub fn run<H: Handler<R>>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            if !self.seek_sync(handler)? {
                return Ok(());
            }

            match self.cursor.peek_bits(0, 32) {
                PACK_START_CODE => self.parse_pack(handler)?,
                SYSTEM_HEADER_START_CODE => self.parse_system_header(handler)?,
                END_CODE => {
                    log::trace!("{:08x}: end code", self.offset());
                    self.stats.end_codes += 1;
                    let next = self.offset() + 4;
                    handler.end(self)?;
                    self.cursor.set_offset(next)?;
                }
                _ => {
                    let next = self.offset() + 1;
                    handler.skip(self)?;
                    if self.cursor.set_offset(next).is_err() {
                        return Ok(());
                    }
                    self.stats.skipped += 1;
                }
            }
        }
    }

    // Discards bytes until a start code prefix is at the head. Returns false
    // once the input is exhausted.
    fn seek_sync<H: Handler<R>>(&mut self, handler: &mut H) -> Result<bool> {
        while self.cursor.peek_bits(0, 24) != START_CODE_PREFIX {
            if self.cursor.is_exhausted() {
                return match self.cursor.take_error() {
                    Some(e) => Err(e.into()),
                    None => Ok(false),
                };
            }

            let next = self.offset() + 1;
            handler.skip(self)?;
            self.cursor.set_offset(next)?;
            self.stats.skipped += 1;
        }
        Ok(true)
    }

    // Moves past a unit whose tail may be missing at the end of the input.
    fn advance_to(&mut self, target: u64) -> Result<()> {
        match self.cursor.set_offset(target) {
            Err(PsError::Truncated) => {
                log::debug!("input ends inside unit ending at {:08x}", target);
                Ok(())
            }
            other => other,
        }
    }

    fn parse_pack<H: Handler<R>>(&mut self, handler: &mut H) -> Result<()> {
        let c = &mut self.cursor;
        let mut pack = PackRecord::default();

        if c.peek_bits(32, 4) == 0b0010 {
            pack.pack_type = PackType::Mpeg1;
            pack.scr = (u64::from(c.peek_bits(36, 3)) << 30)
                | (u64::from(c.peek_bits(40, 15)) << 15)
                | u64::from(c.peek_bits(56, 15));
            pack.mux_rate = c.peek_bits(73, 22);
            pack.size = 12;
        } else if c.peek_bits(32, 2) == 0b01 {
            pack.pack_type = PackType::Mpeg2;
            pack.scr = (u64::from(c.peek_bits(34, 3)) << 30)
                | (u64::from(c.peek_bits(38, 15)) << 15)
                | u64::from(c.peek_bits(54, 15));
            pack.mux_rate = c.peek_bits(80, 22);
            pack.stuffing = c.peek_bits(109, 3);
            pack.size = 14 + pack.stuffing as usize;
        } else {
            pack.size = 4;
        }

        log::trace!(
            "{:08x}: pack type={:?} scr={} size={}",
            self.offset(),
            pack.pack_type,
            pack.scr,
            pack.size
        );

        self.pack = pack;
        self.stats.packs += 1;
        let next = self.offset() + self.pack.size as u64;
        handler.pack(self)?;
        self.advance_to(next)?;

        if !self.seek_sync(handler)? {
            return Ok(());
        }

        if self.cursor.peek_bits(0, 32) == SYSTEM_HEADER_START_CODE {
            self.parse_system_header(handler)?;
            if !self.seek_sync(handler)? {
                return Ok(());
            }
        }

        while self.cursor.peek_bits(0, 24) == START_CODE_PREFIX {
            let sid = self.cursor.peek_bits(24, 8) as u8;
            if self.cursor.available() < 4
                || matches!(sid, SID_PACK | SID_END | SID_SYSTEM_HEADER)
            {
                break;
            }
            self.parse_packet(handler)?;
            if !self.seek_sync(handler)? {
                break;
            }
        }

        Ok(())
    }

    fn parse_system_header<H: Handler<R>>(&mut self, handler: &mut H) -> Result<()> {
        let c = &mut self.cursor;
        self.system_header = SystemHeaderRecord {
            size: c.peek_bits(32, 16) as usize + 6,
            fixed: c.peek_bits(78, 1) == 1,
            csps: c.peek_bits(79, 1) == 1,
        };

        log::trace!("{:08x}: system header size={}", self.offset(), self.system_header.size);

        self.stats.system_headers += 1;
        let next = self.offset() + self.system_header.size as u64;
        handler.system_header(self)?;
        self.advance_to(next)
    }

    fn parse_packet<H: Handler<R>>(&mut self, handler: &mut H) -> Result<()> {
        let c = &mut self.cursor;
        let mut packet = PacketRecord {
            sid: c.peek_bits(24, 8) as u8,
            size: c.peek_bits(32, 16) as usize + 6,
            offset: 6,
            ..Default::default()
        };

        if has_pes_extension(packet.sid) {
            let mut bit = 48;
            while c.peek_bits(bit, 8) == 0xFF {
                if bit > 48 + 8 * MAX_STUFFING_BYTES {
                    break;
                }
                bit += 8;
            }

            if c.peek_bits(bit, 2) == 0b10 {
                parse_mpeg2_extension(c, bit, &mut packet);
            } else {
                parse_mpeg1_extension(c, bit, &mut packet);
            }
        } else if packet.sid == SID_PADDING {
            packet.packet_type = PacketType::Mpeg1;
        }

        if packet.is_private_stream_1() {
            packet.ssid = c.peek_bits(8 * packet.offset, 8) as u8;
        }

        self.packet = packet;
        let start = self.offset();

        if handler.packet_check(&self.packet) {
            log::debug!(
                "{:08x}: rejecting packet sid={:02x} size={}",
                start,
                self.packet.sid,
                self.packet.size
            );
            return self.advance_to(start + 1);
        }

        log::trace!(
            "{:08x}: packet sid={:02x} ssid={:02x} size={} offset={}",
            start,
            self.packet.sid,
            self.packet.ssid,
            self.packet.size,
            self.packet.offset
        );

        self.stats.record_packet(&self.packet);
        handler.packet(self)?;
        self.advance_to(start + self.packet.size as u64)
    }
}
