use std::io::{self, Write};

/// 24-bit prefix shared by every start code.
pub const START_CODE_PREFIX: u32 = 0x00_0001;
/// Pack header start code.
pub const PACK_START_CODE: u32 = 0x0000_01BA;
/// Program end code.
pub const END_CODE: u32 = 0x0000_01B9;
/// System header start code.
pub const SYSTEM_HEADER_START_CODE: u32 = 0x0000_01BB;

/// Id byte of the end code.
pub const SID_END: u8 = 0xB9;
/// Id byte of a pack header.
pub const SID_PACK: u8 = 0xBA;
/// Id byte of a system header.
pub const SID_SYSTEM_HEADER: u8 = 0xBB;
/// Private stream 1, which carries a substream id after its header.
pub const SID_PRIVATE_STREAM_1: u8 = 0xBD;
/// Padding stream.
pub const SID_PADDING: u8 = 0xBE;

/// Number of distinct stream or substream identifiers.
pub const ID_COUNT: usize = 256;

/// System clock frequency used by SCR, PTS and DTS values.
pub const CLOCK_HZ: f64 = 90_000.0;

/// Converts a 90 kHz timestamp to seconds.
pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / CLOCK_HZ
}

/// True for stream ids whose packets carry a PES header extension.
pub fn has_pes_extension(sid: u8) -> bool {
    (0xC0..=0xEF).contains(&sid) || sid == SID_PRIVATE_STREAM_1
}

/// Syntax flavor of a pack header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackType {
    /// Neither MPEG-1 nor MPEG-2 marker bits.
    #[default]
    Unknown,
    /// ISO/IEC 11172-1 pack header.
    Mpeg1,
    /// ISO/IEC 13818-1 pack header.
    Mpeg2,
}

impl PackType {
    /// Numeric code used in listings: 0 unknown, 1 MPEG-1, 2 MPEG-2.
    pub fn code(self) -> u32 {
        match self {
            PackType::Unknown => 0,
            PackType::Mpeg1 => 1,
            PackType::Mpeg2 => 2,
        }
    }
}

/// Syntax flavor of a packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketType {
    /// No header extension decoded.
    #[default]
    Unknown,
    /// MPEG-1 packet header.
    Mpeg1,
    /// MPEG-2 PES header.
    Mpeg2,
}

impl PacketType {
    /// Five-character label used in trace lines.
    pub fn label(self) -> &'static str {
        match self {
            PacketType::Unknown => "UNKWN",
            PacketType::Mpeg1 => "MPEG1",
            PacketType::Mpeg2 => "MPEG2",
        }
    }
}

/// Fields decoded from the most recent pack header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackRecord {
    /// Header syntax.
    pub pack_type: PackType,
    /// System clock reference, 33 bits at 90 kHz.
    pub scr: u64,
    /// Multiplex rate in units of 50 bytes per second.
    pub mux_rate: u32,
    /// Stuffing bytes after the fixed header (MPEG-2 only).
    pub stuffing: u32,
    /// Header size in bytes including stuffing.
    pub size: usize,
}

/// Fields decoded from the most recent system header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemHeaderRecord {
    /// Total size in bytes including the start code and length field.
    pub size: usize,
    /// Fixed bitrate flag.
    pub fixed: bool,
    /// Constrained system parameters flag.
    pub csps: bool,
}

/// Fields decoded from the most recent packet header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketRecord {
    /// Stream id.
    pub sid: u8,
    /// Substream id, meaningful for private stream 1 only.
    pub ssid: u8,
    /// Header syntax.
    pub packet_type: PacketType,
    /// Total size in bytes including the 6-byte start code and length.
    pub size: usize,
    /// Offset of the payload from the start of the packet.
    pub offset: usize,
    /// Presentation timestamp, if present and well-formed.
    pub pts: Option<u64>,
    /// Decoding timestamp, if present and well-formed.
    pub dts: Option<u64>,
}

impl PacketRecord {
    /// True if the packet belongs to private stream 1.
    pub fn is_private_stream_1(&self) -> bool {
        self.sid == SID_PRIVATE_STREAM_1
    }

    /// Bytes from the payload offset to the end of the packet.
    pub fn payload_len(&self) -> usize {
        self.size.saturating_sub(self.offset)
    }
}

/// Per-id packet and byte totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInfo {
    /// Accepted packets.
    pub packets: u32,
    /// Payload bytes of those packets.
    pub bytes: u64,
}

/// Counters accumulated over one parse run.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// System headers seen.
    pub system_headers: u32,
    /// Pack headers seen.
    pub packs: u32,
    /// Packets accepted by the handler's validity check.
    pub packets: u32,
    /// End codes seen.
    pub end_codes: u32,
    /// Bytes discarded while looking for a start code.
    pub skipped: u64,
    /// Totals per stream id.
    pub streams: [StreamInfo; ID_COUNT],
    /// Totals per private stream 1 substream id.
    pub substreams: [StreamInfo; ID_COUNT],
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// All counters zero.
    pub fn new() -> Self {
        Statistics {
            system_headers: 0,
            packs: 0,
            packets: 0,
            end_codes: 0,
            skipped: 0,
            streams: [StreamInfo::default(); ID_COUNT],
            substreams: [StreamInfo::default(); ID_COUNT],
        }
    }

    /// Accounts one accepted packet against its stream and substream.
    ///
    /// Byte totals count payload only, from the payload offset to the end
    /// of the packet.
    pub fn record_packet(&mut self, packet: &PacketRecord) {
        self.packets += 1;
        let payload = packet.payload_len() as u64;

        let stream = &mut self.streams[usize::from(packet.sid)];
        stream.packets += 1;
        stream.bytes += payload;

        if packet.is_private_stream_1() {
            let sub = &mut self.substreams[usize::from(packet.ssid)];
            sub.packets += 1;
            sub.bytes += payload;
        }
    }

    /// Writes the end-of-run summary block.
    pub fn write_summary<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "System headers: {}", self.system_headers)?;
        writeln!(out, "Packs:          {}", self.packs)?;
        writeln!(out, "Packets:        {}", self.packets)?;
        writeln!(out, "End codes:      {}", self.end_codes)?;
        writeln!(out, "Skipped:        {} bytes", self.skipped)?;

        for (sid, info) in self.streams.iter().enumerate() {
            if info.packets > 0 {
                writeln!(
                    out,
                    "Stream {:02x}:      {} packets / {} bytes",
                    sid, info.packets, info.bytes
                )?;
            }
        }

        for (ssid, info) in self.substreams.iter().enumerate() {
            if info.packets > 0 {
                writeln!(
                    out,
                    "Substream {:02x}:   {} packets / {} bytes",
                    ssid, info.packets, info.bytes
                )?;
            }
        }

        Ok(())
    }
}
