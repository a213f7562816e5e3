#![allow(dead_code)]

pub const END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB9];

/// Appends fields MSB first.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    acc: u8,
    bits: u32,
}

impl BitWriter {
    pub fn put(&mut self, value: u64, width: u32) -> &mut Self {
        for shift in (0..width).rev() {
            self.acc = (self.acc << 1) | ((value >> shift) & 1) as u8;
            self.bits += 1;
            if self.bits == 8 {
                self.bytes.push(self.acc);
                self.acc = 0;
                self.bits = 0;
            }
        }
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        assert_eq!(self.bits, 0, "unaligned bit writer");
        std::mem::take(&mut self.bytes)
    }
}

pub fn mpeg2_pack(scr: u64, mux_rate: u32, stuffing: u8) -> Vec<u8> {
    let mut bytes = BitWriter::default()
        .put(0x0000_01BA, 32)
        .put(0b01, 2)
        .put(scr >> 30, 3)
        .put(1, 1)
        .put(scr >> 15, 15)
        .put(1, 1)
        .put(scr, 15)
        .put(1, 1)
        .put(0, 9)
        .put(1, 1)
        .put(u64::from(mux_rate), 22)
        .put(0b11, 2)
        .put(0x1F, 5)
        .put(u64::from(stuffing), 3)
        .finish();
    bytes.extend(std::iter::repeat(0xFF).take(usize::from(stuffing)));
    bytes
}

pub fn mpeg1_pack(scr: u64, mux_rate: u32) -> Vec<u8> {
    BitWriter::default()
        .put(0x0000_01BA, 32)
        .put(0b0010, 4)
        .put(scr >> 30, 3)
        .put(1, 1)
        .put(scr >> 15, 15)
        .put(1, 1)
        .put(scr, 15)
        .put(1, 1)
        .put(1, 1)
        .put(u64::from(mux_rate), 22)
        .put(1, 1)
        .finish()
}

pub fn system_header(fixed: bool, csps: bool) -> Vec<u8> {
    BitWriter::default()
        .put(0x0000_01BB, 32)
        .put(6, 16)
        .put(1, 1)
        .put(50_000, 22)
        .put(1, 1)
        .put(1, 6)
        .put(u64::from(fixed), 1)
        .put(u64::from(csps), 1)
        .put(0b111, 3)
        .put(1, 5)
        .put(0, 1)
        .put(0x7F, 7)
        .finish()
}

/// 5-byte PTS/DTS field with its 4-bit marker.
pub fn timestamp(marker: u8, ts: u64) -> Vec<u8> {
    BitWriter::default()
        .put(u64::from(marker), 4)
        .put(ts >> 30, 3)
        .put(1, 1)
        .put(ts >> 15, 15)
        .put(1, 1)
        .put(ts, 15)
        .put(1, 1)
        .finish()
}

fn packet(sid: u8, body: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x01, sid];
    bytes.extend_from_slice(&(body.len() as u16).to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}

pub fn mpeg2_pes(sid: u8, pts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x80];
    match pts {
        Some(pts) => {
            body.extend_from_slice(&[0x80, 5]);
            body.extend(timestamp(0x2, pts));
        }
        None => body.extend_from_slice(&[0x00, 0]),
    }
    body.extend_from_slice(payload);
    packet(sid, &body)
}

pub fn private1_pes(ssid: u8, pts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![ssid];
    body.extend_from_slice(payload);
    mpeg2_pes(0xBD, pts, &body)
}

pub fn mpeg1_pes(sid: u8, pts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut body = match pts {
        Some(pts) => timestamp(0x2, pts),
        None => vec![0x0F],
    };
    body.extend_from_slice(payload);
    packet(sid, &body)
}

/// Two MPEG-2 packs carrying video, MPEG audio, AC-3 and a subtitle
/// substream, closed by an end code.
pub fn dvd_sample() -> Vec<u8> {
    let mut data = mpeg2_pack(27_000, 25_200, 0);
    data.extend(system_header(false, false));
    data.extend(mpeg2_pes(0xE0, Some(3_600), &[0x10; 32]));
    data.extend(mpeg2_pes(0xC0, Some(3_000), &[0x20; 16]));
    data.extend(private1_pes(0x80, Some(3_300), &[0x01, 0x00, 0x01, 0x30, 0x30, 0x30]));

    data.extend(mpeg2_pack(54_000, 25_200, 2));
    data.extend(mpeg2_pes(0xE0, Some(7_200), &[0x11; 32]));
    data.extend(private1_pes(0x20, Some(9_000), &[0x00, 0x06, 0xAA, 0xBB, 0xCC, 0xDD]));
    data.extend(mpeg2_pes(0xC0, None, &[0x21; 16]));
    data.extend_from_slice(&END_CODE);
    data
}
