use std::fs::File;
use std::io::{BufWriter, Read, Write};

use super::naming::stream_file_name;
use super::parser::PsParser;
use super::select::SelectionPolicy;
use super::spu::SubtitleRepacketizer;
use super::types::{PacketRecord, Statistics, ID_COUNT, SID_PRIVATE_STREAM_1};
use crate::config::Options;
use crate::error::{PsError, Result};
use crate::format::Handler;
use crate::utils::StagingBuffer;

/// Magic written at the start of every DVD subtitle output.
pub const SPU_MAGIC: &[u8; 4] = b"SPU ";

/// Bytes of DVD AC-3 framing following the substream id.
const DVD_AC3_HEADER_LEN: usize = 3;

enum Slot {
    Closed,
    Shared,
    File(BufWriter<File>),
}

/// Writes the payload of every selected stream and substream to its own
/// output.
///
/// Outputs are opened on the first packet of each id: a file named from
/// [`Options::base_name`] if one is set, otherwise the shared writer given to
/// [`Demux::new`]. Private stream 1 payloads lose their substream id byte
/// (and the DVD AC-3 header when requested); DVD subtitles are re-framed by
/// [`SubtitleRepacketizer`].
pub struct Demux<'a, W> {
    out: W,
    policy: &'a mut SelectionPolicy,
    options: &'a Options,
    slots: Vec<Slot>,
    packet_buf: StagingBuffer,
    spu: SubtitleRepacketizer,
}

// Output slot of a packet: streams first, then private stream 1 substreams.
fn slot_index(packet: &PacketRecord) -> usize {
    if packet.is_private_stream_1() {
        ID_COUNT + usize::from(packet.ssid)
    } else {
        usize::from(packet.sid)
    }
}

// Id substituted into the name template.
fn file_id(packet: &PacketRecord) -> u32 {
    if packet.is_private_stream_1() {
        (u32::from(SID_PRIVATE_STREAM_1) << 8) | u32::from(packet.ssid)
    } else {
        u32::from(packet.sid)
    }
}

impl<'a, W: Write> Demux<'a, W> {
    /// Creates a demuxer. `out` receives every stream when no base name is
    /// configured.
    pub fn new(out: W, policy: &'a mut SelectionPolicy, options: &'a Options) -> Self {
        Demux {
            out,
            policy,
            options,
            slots: (0..2 * ID_COUNT).map(|_| Slot::Closed).collect(),
            packet_buf: StagingBuffer::new(),
            spu: SubtitleRepacketizer::new(),
        }
    }

    /// Returns the shared output writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Demuxes `input`, then flushes and closes every output.
    pub fn run<R: Read>(&mut self, input: R) -> Result<Statistics> {
        let mut parser = PsParser::new(input);
        let result = parser.run(self);
        let closed = self.close_all();

        let stats = result.map(|_| parser.stats)?;
        closed?;
        Ok(stats)
    }

    fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for slot in self.slots.iter_mut() {
            if let Slot::File(mut file) = std::mem::replace(slot, Slot::Closed) {
                if let Err(e) = file.flush() {
                    first_err.get_or_insert(e);
                }
            }
        }
        self.out.flush()?;
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    // Opens the output for a packet's id. Returns false if it cannot be
    // opened, after removing the id from the selection.
    fn open(&mut self, packet: &PacketRecord) -> Result<bool> {
        let options = self.options;
        let index = slot_index(packet);
        let subtitles = options.dvd_subtitles && packet.is_private_stream_1();

        let slot = match &options.base_name {
            None => {
                if subtitles {
                    self.out.write_all(SPU_MAGIC)?;
                }
                Slot::Shared
            }
            Some(template) => {
                let name = stream_file_name(template, file_id(packet));
                let file = match File::create(&name) {
                    Ok(file) => file,
                    Err(e) => {
                        log::warn!("demux: can't open stream file {}: {}", name, e);
                        self.policy.deselect(packet);
                        return Ok(false);
                    }
                };
                log::debug!("demux: writing id {:04x} to {}", file_id(packet), name);

                let mut writer = BufWriter::new(file);
                if subtitles {
                    writer.write_all(SPU_MAGIC)?;
                }
                Slot::File(writer)
            }
        };

        self.slots[index] = slot;
        Ok(true)
    }
}

impl<R: Read, W: Write> Handler<R> for Demux<'_, W> {
    fn packet(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        let packet = parser.packet.clone();
        if self.policy.is_excluded(&packet) {
            return Ok(());
        }

        let mut header_len = packet.offset;
        if packet.is_private_stream_1() {
            header_len += 1;
            if self.options.dvd_ac3 {
                header_len += DVD_AC3_HEADER_LEN;
            }
        }

        if header_len > packet.size {
            log::error!(
                "demux: packet too small (sid={:02x} size={})",
                packet.sid,
                packet.size
            );
            return Err(PsError::Undersized {
                sid: packet.sid,
                size: packet.size,
            });
        }

        let index = slot_index(&packet);
        if matches!(self.slots[index], Slot::Closed) && !self.open(&packet)? {
            return Ok(());
        }

        parser.cursor_mut().skip(header_len as u64)?;
        let count = packet.size - header_len;

        let Demux {
            out,
            slots,
            packet_buf,
            spu,
            options,
            ..
        } = self;
        let sink: &mut dyn Write = match &mut slots[index] {
            Slot::File(file) => file,
            _ => out,
        };

        if packet.is_private_stream_1() && options.dvd_subtitles {
            return spu.copy(parser.cursor_mut(), packet.pts.unwrap_or(0), sink, count);
        }

        let got = packet_buf.fill_from(parser.cursor_mut(), count)?;
        let mut incomplete = None;
        if got != count {
            log::warn!(
                "demux: incomplete packet (sid={:02x} size={}/{})",
                packet.sid,
                got,
                count
            );
            let err = PsError::IncompleteUnit {
                sid: packet.sid,
                got,
                expected: count,
            };
            if options.drop_incomplete {
                packet_buf.clear();
                return Err(err);
            }
            incomplete = Some(err);
        }

        packet_buf.flush_and_clear(sink)?;

        match incomplete {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn packet_check(&self, packet: &PacketRecord) -> bool {
        self.policy.is_invalid(packet)
    }
}
