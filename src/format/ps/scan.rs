use std::io::{Read, Write};

use super::parser::PsParser;
use super::select::SelectionPolicy;
use super::types::{ticks_to_seconds, PacketRecord, Statistics, ID_COUNT};
use crate::config::Options;
use crate::error::{PsError, Result};
use crate::format::Handler;

/// Reports the first packet of every selected stream and substream, then
/// the run statistics.
///
/// With [`Options::first_pts`] set, later packets are reported too whenever
/// their PTS is lower than any seen before on the same id.
pub struct Scan<'a, W> {
    out: W,
    policy: &'a SelectionPolicy,
    options: &'a Options,
    lowest_pts: [u64; ID_COUNT],
    lowest_sub_pts: [u64; ID_COUNT],
}

impl<'a, W: Write> Scan<'a, W> {
    /// Creates a handler writing its report to `out`.
    pub fn new(out: W, policy: &'a SelectionPolicy, options: &'a Options) -> Self {
        Scan {
            out,
            policy,
            options,
            lowest_pts: [u64::MAX; ID_COUNT],
            lowest_sub_pts: [u64::MAX; ID_COUNT],
        }
    }

    /// Lowest PTS seen on stream `sid`.
    pub fn lowest_pts(&self, sid: u8) -> Option<u64> {
        Some(self.lowest_pts[usize::from(sid)]).filter(|&pts| pts != u64::MAX)
    }

    /// Lowest PTS seen on private stream 1 substream `ssid`.
    pub fn lowest_substream_pts(&self, ssid: u8) -> Option<u64> {
        Some(self.lowest_sub_pts[usize::from(ssid)]).filter(|&pts| pts != u64::MAX)
    }

    /// Returns the report writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Scans `input` and writes the report followed by the statistics block.
    pub fn run<R: Read>(&mut self, input: R) -> Result<Statistics> {
        let mut parser = PsParser::new(input);
        let result = parser.run(self);

        parser.stats.write_summary(&mut self.out)?;
        self.out.flush()?;

        result.map(|_| parser.stats)
    }

    fn write_packet_line(&mut self, offset: u64, packet: &PacketRecord) -> Result<()> {
        write!(self.out, "{:08x}: sid={:02x}", offset, packet.sid)?;
        if packet.is_private_stream_1() {
            write!(self.out, "[{:02x}]", packet.ssid)?;
        } else {
            write!(self.out, "    ")?;
        }
        write!(self.out, " {}", packet.packet_type.label())?;
        if let Some(pts) = packet.pts {
            write!(self.out, " pts={}[{:.4}]", pts, ticks_to_seconds(pts))?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<R: Read, W: Write> Handler<R> for Scan<'_, W> {
    fn packet(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        let packet = parser.packet.clone();
        if self.policy.is_excluded(&packet) {
            return Ok(());
        }

        let offset = parser.offset();
        match parser.cursor_mut().set_offset(offset + packet.size as u64) {
            Ok(()) => {}
            Err(PsError::Truncated) => {
                writeln!(
                    self.out,
                    "{:08x}: sid={:02x} ssid={:02x} incomplete packet",
                    offset, packet.sid, packet.ssid
                )?;
            }
            Err(e) => return Err(e),
        }

        let (seen, lowest) = if packet.is_private_stream_1() {
            (
                parser.stats.substreams[usize::from(packet.ssid)].packets,
                &mut self.lowest_sub_pts[usize::from(packet.ssid)],
            )
        } else {
            (
                parser.stats.streams[usize::from(packet.sid)].packets,
                &mut self.lowest_pts[usize::from(packet.sid)],
            )
        };

        let lowers = match packet.pts {
            Some(pts) if pts < *lowest => {
                *lowest = pts;
                true
            }
            _ => false,
        };

        if seen > 1 && !(self.options.first_pts && lowers) {
            return Ok(());
        }

        self.write_packet_line(offset, &packet)
    }

    fn packet_check(&self, packet: &PacketRecord) -> bool {
        self.policy.is_invalid(packet)
    }

    fn end(&mut self, parser: &mut PsParser<R>) -> Result<()> {
        if !self.options.no_end {
            writeln!(self.out, "{:08x}: end code", parser.offset())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::format::ps::test_utils::*;
    use pretty_assertions::assert_eq;

    /// Yields `data`, then fails every read.
    struct BrokenSource {
        data: Vec<u8>,
    }

    impl Read for BrokenSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "source gone"));
            }
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    fn scan(data: &[u8], options: &Options) -> (String, Vec<Option<u64>>) {
        let mut policy = SelectionPolicy::new();
        policy.select_all();

        let mut scan = Scan::new(Vec::new(), &policy, options);
        scan.run(data).unwrap();
        let lowest = vec![scan.lowest_pts(0xE0), scan.lowest_substream_pts(0x20)];
        (String::from_utf8(scan.into_inner()).unwrap(), lowest)
    }

    fn sample() -> Vec<u8> {
        let mut data = mpeg2_pack(0, 1, 0);
        data.extend(mpeg2_pes(0xE0, Some(9000), None, &[0; 8]));
        data.extend(mpeg2_pes(0xE0, Some(4500), None, &[0; 8]));
        data.extend(private1_pes(0x20, Some(1800), &[0; 4]));
        data.extend(mpeg2_pes(0xE0, Some(3000), None, &[0; 8]));
        data.extend_from_slice(&END_CODE_BYTES);
        data
    }

    #[test]
    fn test_first_packet_per_stream() {
        let (text, lowest) = scan(&sample(), &Options::new());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "0000000e: sid=e0     MPEG2 pts=9000[0.1000]");
        assert_eq!(lines[1], "0000003a: sid=bd[20] MPEG2 pts=1800[0.0200]");
        assert_eq!(lines[2], "00000063: end code");
        assert_eq!(lines[3], "System headers: 0");
        assert!(text.contains("Stream e0:      3 packets / 24 bytes"));
        assert!(text.contains("Substream 20:   1 packets / 5 bytes"));

        assert_eq!(lowest, vec![Some(3000), Some(1800)]);
    }

    #[test]
    fn test_first_pts_reports_new_minimum() {
        let options = Options {
            first_pts: true,
            no_end: true,
            ..Options::new()
        };
        let (text, _) = scan(&sample(), &options);
        let lines: Vec<&str> = text.lines().take(4).collect();

        assert_eq!(
            lines,
            vec![
                "0000000e: sid=e0     MPEG2 pts=9000[0.1000]",
                "00000024: sid=e0     MPEG2 pts=4500[0.0500]",
                "0000003a: sid=bd[20] MPEG2 pts=1800[0.0200]",
                "0000004d: sid=e0     MPEG2 pts=3000[0.0333]",
            ]
        );
    }

    #[test]
    fn test_idempotent() {
        let data = sample();
        let options = Options::new();
        assert_eq!(scan(&data, &options), scan(&data, &options));
    }

    #[test]
    fn test_excluded_streams_are_silent() {
        let mut policy = SelectionPolicy::new();
        policy.streams_mut().insert(0xBD);
        policy.substreams_mut().insert(0x20);
        let options = Options::new();

        let mut scan = Scan::new(Vec::new(), &policy, &options);
        let stats = scan.run(&sample()[..]).unwrap();
        let text = String::from_utf8(scan.into_inner()).unwrap();

        assert!(!text.contains("sid=e0"));
        assert!(text.contains("sid=bd[20]"));
        // Statistics still count every packet
        assert_eq!(stats.packets, 4);
    }

    #[test]
    fn test_incomplete_packet() {
        let mut data = mpeg2_pack(0, 1, 0);
        let pes = mpeg2_pes(0xC0, None, None, &[0x11; 40]);
        data.extend_from_slice(&pes[..20]);

        let (text, _) = scan(&data, &Options::new());
        assert!(text.starts_with(
            "0000000e: sid=c0 ssid=00 incomplete packet\n0000000e: sid=c0     MPEG2\n"
        ));
    }

    #[test]
    fn test_read_error_inside_packet_aborts() {
        let mut data = mpeg2_pack(0, 1, 0);
        let pes = mpeg2_pes(0xC0, None, None, &[0x11; 40]);
        data.extend_from_slice(&pes[..20]);

        let mut policy = SelectionPolicy::new();
        policy.select_all();
        let options = Options::new();

        let mut scan = Scan::new(Vec::new(), &policy, &options);
        let result = scan.run(BrokenSource { data });
        let text = String::from_utf8(scan.into_inner()).unwrap();

        assert!(matches!(result, Err(PsError::Io(_))));
        assert!(!text.contains("incomplete packet"));
    }
}
