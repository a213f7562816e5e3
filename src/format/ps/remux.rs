use std::fs::File;
use std::io::{self, BufWriter, Read, Write};

use super::naming::{stream_file_name, DEFAULT_TEMPLATE};
use super::parser::PsParser;
use super::select::SelectionPolicy;
use super::types::{PacketRecord, Statistics, END_CODE, SID_PACK, SID_SYSTEM_HEADER};
use crate::config::Options;
use crate::error::{PsError, Result};
use crate::format::Handler;
use crate::utils::StagingBuffer;

// Remux output: either the caller's writer or a numbered file sequence.
enum Sink<W> {
    Stream(W),
    Sequence {
        template: String,
        next: u32,
        file: Option<BufWriter<File>>,
    },
}

impl<W: Write> Sink<W> {
    // Closes the current sequence file, if any, and opens the next one.
    fn rotate(&mut self) -> Result<()> {
        if let Sink::Sequence { template, next, file } = self {
            if let Some(mut current) = file.take() {
                current.flush()?;
            }
            let name = stream_file_name(template, *next);
            log::debug!("remux: opening {}", name);
            *file = Some(BufWriter::new(File::create(&name)?));
            *next += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self {
            Sink::Stream(out) => out.flush()?,
            Sink::Sequence { file, .. } => {
                if let Some(mut current) = file.take() {
                    current.flush()?;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stream(out) => out.write(buf),
            Sink::Sequence { file: Some(f), .. } => f.write(buf),
            Sink::Sequence { file: None, .. } => {
                Err(io::Error::new(io::ErrorKind::NotConnected, "no remux output file open"))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stream(out) => out.flush(),
            Sink::Sequence { file: Some(f), .. } => f.flush(),
            Sink::Sequence { file: None, .. } => Ok(()),
        }
    }
}

/// Rewrites the program stream keeping only selected packets.
///
/// Pack headers are held back until a packet or system header follows them,
/// so packs left empty by the selection disappear from the output unless
/// [`Options::empty_packs`] is set. Stream and substream ids are rewritten
/// through the policy's remap tables.
pub struct Remux<'a, W> {
    sink: Sink<W>,
    policy: &'a SelectionPolicy,
    options: &'a Options,
    pack_buf: StagingBuffer,
    shdr_buf: StagingBuffer,
    packet_buf: StagingBuffer,
}

impl<'a, W: Write> Remux<'a, W> {
    /// Creates a remuxer writing to `out`.
    ///
    /// With [`Options::split`] the output goes to files named from the
    /// configured template (sequence number as id) and `out` is not used.
    pub fn new(out: W, policy: &'a SelectionPolicy, options: &'a Options) -> Self {
        let sink = if options.split {
            Sink::Sequence {
                template: options
                    .base_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
                next: 0,
                file: None,
            }
        } else {
            Sink::Stream(out)
        };

        Remux {
            sink,
            policy,
            options,
            pack_buf: StagingBuffer::new(),
            shdr_buf: StagingBuffer::new(),
            packet_buf: StagingBuffer::new(),
        }
    }

    /// Returns the writer passed to [`Remux::new`], unless output was split.
    pub fn into_inner(self) -> Option<W> {
        match self.sink {
            Sink::Stream(out) => Some(out),
            Sink::Sequence { .. } => None,
        }
    }

    /// Remuxes `input`, then writes the trailing end code if end codes are
    /// synthesized and closes the output.
    ///
    /// A parse error takes precedence over errors from the trailer or close.
    pub fn run<R: Read>(&mut self, input: R) -> Result<Statistics> {
        if self.options.split {
            self.sink.rotate()?;
        }

        let mut parser = PsParser::new(input);
        let result = parser.run(self);

        let trailer = if self.options.no_end {
            self.sink.write_all(&END_CODE.to_be_bytes()).map_err(PsError::from)
        } else {
            Ok(())
        };
        let closed = self.sink.close();

        result?;
        trailer?;
        closed?;
        Ok(parser.stats)
    }
}

impl<R: Read, W: Write> Handler<R> for Remux<'_, W> {
    fn skip(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.options.remux_skipped {
            parser.cursor_mut().copy_to(&mut self.sink, 1)?;
        }
        Ok(())
    }

    fn pack(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        let size = parser.pack.size;
        let got = self.pack_buf.fill_from(parser.cursor_mut(), size)?;
        if got != size {
            return Err(PsError::IncompleteUnit {
                sid: SID_PACK,
                got,
                expected: size,
            });
        }

        if self.options.empty_packs {
            self.pack_buf.flush_and_clear(&mut self.sink)?;
        }
        Ok(())
    }

    fn system_header(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.options.no_system_headers && parser.stats.system_headers > 1 {
            return Ok(());
        }

        self.pack_buf.flush_and_clear(&mut self.sink)?;

        let size = parser.system_header.size;
        let got = self.shdr_buf.fill_from(parser.cursor_mut(), size)?;
        if got != size {
            self.shdr_buf.clear();
            return Err(PsError::IncompleteUnit {
                sid: SID_SYSTEM_HEADER,
                got,
                expected: size,
            });
        }

        self.shdr_buf.flush_and_clear(&mut self.sink)
    }

    fn packet(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        let packet = parser.packet.clone();
        if self.policy.is_excluded(&packet) {
            return Ok(());
        }

        let got = self.packet_buf.fill_from(parser.cursor_mut(), packet.size)?;
        let mut incomplete = None;
        if got != packet.size {
            log::warn!(
                "remux: incomplete packet (sid={:02x} size={}/{})",
                packet.sid,
                got,
                packet.size
            );
            let err = PsError::IncompleteUnit {
                sid: packet.sid,
                got,
                expected: packet.size,
            };
            if self.options.drop_incomplete {
                self.packet_buf.clear();
                return Err(err);
            }
            incomplete = Some(err);
        }

        if self.packet_buf.len() >= 4 {
            self.packet_buf[3] = self.policy.stream_id(packet.sid);
            if packet.is_private_stream_1() && self.packet_buf.len() > packet.offset {
                self.packet_buf[packet.offset] = self.policy.substream_id(packet.ssid);
            }
        }

        self.pack_buf.flush_and_clear(&mut self.sink)?;
        self.packet_buf.flush_and_clear(&mut self.sink)?;

        match incomplete {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn packet_check(&self, packet: &PacketRecord) -> bool {
        self.policy.is_invalid(packet)
    }

    fn end(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.options.no_end {
            return Ok(());
        }

        parser.cursor_mut().copy_to(&mut self.sink, 4)?;

        if self.options.split {
            self.sink.rotate()?;
        }
        Ok(())
    }
}
