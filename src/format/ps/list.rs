use std::io::{Read, Write};

use super::parser::PsParser;
use super::select::SelectionPolicy;
use super::types::{ticks_to_seconds, PacketRecord, Statistics};
use crate::config::Options;
use crate::error::Result;
use crate::format::Handler;

/// Writes one line per pack, system header, packet and end code.
///
/// Runs of skipped bytes are coalesced into a single `skip` line printed
/// before the next listed unit.
pub struct List<'a, W> {
    out: W,
    policy: &'a SelectionPolicy,
    options: &'a Options,
    skip_offset: u64,
    skip_count: u64,
}

impl<'a, W: Write> List<'a, W> {
    /// Creates a handler writing its report to `out`.
    pub fn new(out: W, policy: &'a SelectionPolicy, options: &'a Options) -> Self {
        List {
            out,
            policy,
            options,
            skip_offset: 0,
            skip_count: 0,
        }
    }

    /// Returns the report writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Lists `input` and writes the statistics block.
    pub fn run<R: Read>(&mut self, input: R) -> Result<Statistics> {
        let mut parser = PsParser::new(input);
        let result = parser.run(self);

        self.flush_skip()?;
        parser.stats.write_summary(&mut self.out)?;
        self.out.flush()?;

        result.map(|_| parser.stats)
    }

    fn flush_skip(&mut self) -> Result<()> {
        if self.skip_count > 0 {
            writeln!(self.out, "{:08x}: skip {}", self.skip_offset, self.skip_count)?;
            self.skip_count = 0;
        }
        Ok(())
    }
}

impl<R: Read, W: Write> Handler<R> for List<'_, W> {
    fn skip(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.skip_count == 0 {
            self.skip_offset = parser.offset();
        }
        self.skip_count += 1;
        Ok(())
    }

    fn pack(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.options.no_packs {
            return Ok(());
        }
        self.flush_skip()?;

        let pack = &parser.pack;
        writeln!(
            self.out,
            "{:08x}: pack[{}]: type={} scr={}[{:.4}] mux={}[{:.2}] stuff={}",
            parser.offset(),
            parser.stats.packs - 1,
            pack.pack_type.code(),
            pack.scr,
            ticks_to_seconds(pack.scr),
            pack.mux_rate,
            50.0 * f64::from(pack.mux_rate),
            pack.stuffing
        )?;
        Ok(())
    }

    fn system_header(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.options.no_system_headers {
            return Ok(());
        }
        self.flush_skip()?;

        let hdr = &parser.system_header;
        writeln!(
            self.out,
            "{:08x}: system header[{}]: size={} fixed={} csps={}",
            parser.offset(),
            parser.stats.system_headers - 1,
            hdr.size,
            u8::from(hdr.fixed),
            u8::from(hdr.csps)
        )?;
        Ok(())
    }

    fn packet(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        let packet = &parser.packet;
        if self.options.no_packets || self.policy.is_excluded(packet) {
            return Ok(());
        }
        self.flush_skip()?;

        write!(
            self.out,
            "{:08x}: packet[{}]: sid={:02x}",
            parser.offset(),
            parser.stats.streams[usize::from(packet.sid)].packets - 1,
            packet.sid
        )?;
        if packet.is_private_stream_1() {
            write!(self.out, "[{:02x}]", packet.ssid)?;
        } else {
            write!(self.out, "    ")?;
        }
        write!(self.out, " {} size={}", packet.packet_type.label(), packet.size)?;

        if packet.pts.is_some() || packet.dts.is_some() {
            let pts = packet.pts.unwrap_or(0);
            let dts = packet.dts.unwrap_or(0);
            write!(
                self.out,
                " pts={}[{:.4}] dts={}[{:.4}]",
                pts,
                ticks_to_seconds(pts),
                dts,
                ticks_to_seconds(dts)
            )?;
        }

        writeln!(self.out)?;
        Ok(())
    }

    fn packet_check(&self, packet: &PacketRecord) -> bool {
        self.policy.is_invalid(packet)
    }

    fn end(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if self.options.no_end {
            return Ok(());
        }
        self.flush_skip()?;
        writeln!(self.out, "{:08x}: end", parser.offset())?;
        Ok(())
    }
}
