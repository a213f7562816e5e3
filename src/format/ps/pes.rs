use std::io::Read;

#[cfg(test)]
use bytes::{BufMut, BytesMut};

use super::types::{PacketRecord, PacketType};
use crate::utils::BitCursor;

/// Leading 0xFF stuffing tolerated before a packet header extension.
pub const MAX_STUFFING_BYTES: usize = 16;

const MARKER_PTS_ONLY: u32 = 0x2;
const MARKER_PTS_WITH_DTS: u32 = 0x3;
const MARKER_DTS: u32 = 0x1;

/// Decodes a 33-bit timestamp whose 4-bit marker nibble starts at `bit`.
fn peek_timestamp<R: Read>(cursor: &mut BitCursor<R>, bit: usize) -> u64 {
    let hi = u64::from(cursor.peek_bits(bit + 4, 3));
    let mid = u64::from(cursor.peek_bits(bit + 8, 15));
    let lo = u64::from(cursor.peek_bits(bit + 24, 15));
    (hi << 30) | (mid << 15) | lo
}

/// Decodes an MPEG-2 PES header extension starting at `bit`.
///
/// Timestamps are taken only when their marker nibbles agree with the
/// PTS/DTS flags. The payload offset always follows the declared header
/// data length.
pub(crate) fn parse_mpeg2_extension<R: Read>(
    cursor: &mut BitCursor<R>,
    bit: usize,
    packet: &mut PacketRecord,
) {
    packet.packet_type = PacketType::Mpeg2;

    let flags = cursor.peek_bits(bit + 8, 2);
    let header_len = cursor.peek_bits(bit + 16, 8) as usize;

    if flags == 0b10 && cursor.peek_bits(bit + 24, 4) == MARKER_PTS_ONLY {
        packet.pts = Some(peek_timestamp(cursor, bit + 24));
    } else if flags == 0b11 && cursor.peek_bits(bit + 24, 4) == MARKER_PTS_WITH_DTS {
        packet.pts = Some(peek_timestamp(cursor, bit + 24));
        if cursor.peek_bits(bit + 64, 4) == MARKER_DTS {
            packet.dts = Some(peek_timestamp(cursor, bit + 64));
        }
    }

    packet.offset = (bit + 8 * (header_len + 3)) / 8;
}

/// Decodes an MPEG-1 packet header tail starting at `bit`.
pub(crate) fn parse_mpeg1_extension<R: Read>(
    cursor: &mut BitCursor<R>,
    mut bit: usize,
    packet: &mut PacketRecord,
) {
    packet.packet_type = PacketType::Mpeg1;

    // STD buffer scale and size
    if cursor.peek_bits(bit, 2) == 0b01 {
        bit += 16;
    }

    let lead = cursor.peek_bits(bit, 8);
    if lead & 0xF0 == 0x20 {
        packet.pts = Some(peek_timestamp(cursor, bit));
        bit += 40;
    } else if lead & 0xF0 == 0x30 {
        packet.pts = Some(peek_timestamp(cursor, bit));
        packet.dts = Some(peek_timestamp(cursor, bit + 40));
        bit += 80;
    } else if lead == 0x0F {
        bit += 8;
    }

    packet.offset = bit / 8;
}

/// Writes a 5-byte timestamp field with the given 4-bit marker.
#[cfg(test)]
pub(crate) fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) {
    buf.put_u8((marker << 4) | ((ts >> 29) & 0x0E) as u8 | 0x01);
    buf.put_u16((((ts >> 14) & 0xFFFE) | 0x01) as u16);
    buf.put_u16((((ts << 1) & 0xFFFE) | 0x01) as u16);
}

/// An MPEG-2 PES header as written in front of a payload, used to build
/// test streams.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct PesHeader {
    pub stream_id: u8,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    /// Stuffing bytes appended to the header data.
    pub stuffing: u8,
}

#[cfg(test)]
impl PesHeader {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Sets the DTS. Only written when a PTS is present as well.
    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self
    }

    fn header_data_len(&self) -> usize {
        let ts = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 10,
            (Some(_), None) => 5,
            _ => 0,
        };
        ts + usize::from(self.stuffing)
    }

    /// Total header size in bytes, which is the payload offset of the packet.
    pub fn size(&self) -> usize {
        9 + self.header_data_len()
    }

    /// Writes the header for a packet carrying `payload_len` payload bytes.
    pub fn write_to(&self, buf: &mut BytesMut, payload_len: usize) {
        let header_data_len = self.header_data_len();

        buf.put_slice(&[0x00, 0x00, 0x01, self.stream_id]);
        buf.put_u16((3 + header_data_len + payload_len) as u16);
        buf.put_u8(0x80);

        let flags = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 0xC0,
            (Some(_), None) => 0x80,
            _ => 0x00,
        };
        buf.put_u8(flags);
        buf.put_u8(header_data_len as u8);

        match (self.pts, self.dts) {
            (Some(pts), Some(dts)) => {
                write_timestamp(buf, MARKER_PTS_WITH_DTS as u8, pts);
                write_timestamp(buf, MARKER_DTS as u8, dts);
            }
            (Some(pts), None) => write_timestamp(buf, MARKER_PTS_ONLY as u8, pts),
            _ => {}
        }

        buf.put_bytes(0xFF, usize::from(self.stuffing));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    fn decode_mpeg2(bytes: &[u8]) -> PacketRecord {
        let mut cursor = BitCursor::new(bytes);
        let mut packet = PacketRecord::default();
        parse_mpeg2_extension(&mut cursor, 48, &mut packet);
        packet
    }

    fn decode_mpeg1(bytes: &[u8]) -> PacketRecord {
        let mut cursor = BitCursor::new(bytes);
        let mut packet = PacketRecord::default();
        parse_mpeg1_extension(&mut cursor, 48, &mut packet);
        packet
    }

    #[test]
    fn test_mpeg2_pts_only() {
        let mut buf = BytesMut::new();
        PesHeader::new(0xE0).with_pts(90_000).write_to(&mut buf, 4);
        buf.put_slice(&[1, 2, 3, 4]);

        let packet = decode_mpeg2(&buf);
        assert_eq!(packet.packet_type, PacketType::Mpeg2);
        assert_eq!(packet.pts, Some(90_000));
        assert_eq!(packet.dts, None);
        assert_eq!(packet.offset, 14);
    }

    #[test]
    fn test_mpeg2_pts_and_dts() {
        let mut buf = BytesMut::new();
        let header = PesHeader::new(0xE0).with_pts(0x1_2345_6789).with_dts(0x0_8765_4321);
        header.write_to(&mut buf, 0);

        let packet = decode_mpeg2(&buf);
        assert_eq!(packet.pts, Some(0x1_2345_6789));
        assert_eq!(packet.dts, Some(0x0_8765_4321));
        assert_eq!(packet.offset, header.size());
        assert_eq!(packet.offset, 19);
    }

    #[test]
    fn test_mpeg2_marker_mismatch_drops_timestamp() {
        let mut buf = BytesMut::new();
        PesHeader::new(0xC0).with_pts(1234).write_to(&mut buf, 0);
        // Claim PTS+DTS while the marker says PTS only
        buf[7] = 0xC0;

        let packet = decode_mpeg2(&buf);
        assert_eq!(packet.pts, None);
        assert_eq!(packet.dts, None);
        assert_eq!(packet.offset, 14);
    }

    #[test]
    fn test_mpeg2_stuffing_moves_offset() {
        let mut buf = BytesMut::new();
        let header = PesHeader {
            stream_id: 0xBD,
            pts: None,
            dts: None,
            stuffing: 4,
        };
        header.write_to(&mut buf, 1);
        buf.put_u8(0x80);

        let packet = decode_mpeg2(&buf);
        assert_eq!(packet.offset, 13);
        assert_eq!(packet.pts, None);
    }

    #[test]
    fn test_mpeg1_variants() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x00, 0x00, 0x01, 0xC0, 0x00, 0x08]);
        // STD buffer fields then PTS
        buf.put_slice(&[0x40, 0x20]);
        write_timestamp(&mut buf, 0x2, 3600);
        let packet = decode_mpeg1(&buf);
        assert_eq!(packet.packet_type, PacketType::Mpeg1);
        assert_eq!(packet.pts, Some(3600));
        assert_eq!(packet.offset, 13);

        let mut buf = BytesMut::new();
        buf.put_slice(&[0x00, 0x00, 0x01, 0xE0, 0x00, 0x0A]);
        write_timestamp(&mut buf, 0x3, 7200);
        write_timestamp(&mut buf, 0x1, 3600);
        let packet = decode_mpeg1(&buf);
        assert_eq!(packet.pts, Some(7200));
        assert_eq!(packet.dts, Some(3600));
        assert_eq!(packet.offset, 16);

        let buf = [0x00, 0x00, 0x01, 0xE0, 0x00, 0x01, 0x0F];
        let packet = decode_mpeg1(&buf);
        assert_eq!(packet.pts, None);
        assert_eq!(packet.offset, 7);

        let buf = [0x00, 0x00, 0x01, 0xE0, 0x00, 0x01, 0x85];
        let packet = decode_mpeg1(&buf);
        assert_eq!(packet.offset, 6);
    }

    #[test]
    fn test_write_timestamp_layout() {
        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x2, 0);
        assert_eq!(&buf[..], &[0x21, 0x00, 0x01, 0x00, 0x01]);
    }

    #[quickcheck]
    fn prop_timestamp_survives_header(pts: u64, dts: u64) -> bool {
        let pts = pts & 0x1_FFFF_FFFF;
        let dts = dts & 0x1_FFFF_FFFF;

        let mut buf = BytesMut::new();
        PesHeader::new(0xE0).with_pts(pts).with_dts(dts).write_to(&mut buf, 0);

        let packet = decode_mpeg2(&buf);
        packet.pts == Some(pts) && packet.dts == Some(dts)
    }
}
