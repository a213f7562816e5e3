use bitvec::prelude::*;

use super::types::{PacketRecord, ID_COUNT, SID_PRIVATE_STREAM_1};

type IdBits = BitArr!(for ID_COUNT, in u64, Lsb0);

/// A set of 8-bit stream or substream identifiers.
#[derive(Clone, Debug)]
pub struct IdSet {
    bits: IdBits,
}

impl Default for IdSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for IdSet {
    fn eq(&self, other: &Self) -> bool {
        self.bits.as_bitslice() == other.bits.as_bitslice()
    }
}

impl Eq for IdSet {}

impl IdSet {
    /// A set with no ids.
    pub fn empty() -> Self {
        IdSet { bits: BitArray::ZERO }
    }

    /// A set with all 256 ids.
    pub fn full() -> Self {
        let mut set = Self::empty();
        set.bits.fill(true);
        set
    }

    /// True if `id` is in the set.
    pub fn contains(&self, id: u8) -> bool {
        self.bits[usize::from(id)]
    }

    /// Adds `id`.
    pub fn insert(&mut self, id: u8) {
        self.bits.set(usize::from(id), true);
    }

    /// Removes `id`.
    pub fn remove(&mut self, id: u8) {
        self.bits.set(usize::from(id), false);
    }

    /// Sets or clears every id in `lo..=hi`.
    pub fn set_range(&mut self, lo: u8, hi: u8, value: bool) {
        if lo <= hi {
            self.bits[usize::from(lo)..=usize::from(hi)].fill(value);
        }
    }

    /// Number of ids in the set.
    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    /// True if the set holds no ids.
    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Ids in the set, ascending.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bits.iter_ones().map(|i| i as u8)
    }
}

/// Which streams are processed, which are rejected as invalid, and how ids
/// are rewritten on output.
///
/// One policy is owned per run and handed to the mode handler. Demux may
/// narrow the selection while running when an output cannot be opened.
#[derive(Clone, Debug)]
pub struct SelectionPolicy {
    streams: IdSet,
    substreams: IdSet,
    invalid: IdSet,
    stream_map: [u8; ID_COUNT],
    substream_map: [u8; ID_COUNT],
    packet_max: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn identity_map() -> [u8; ID_COUNT] {
    let mut map = [0u8; ID_COUNT];
    for (i, slot) in map.iter_mut().enumerate() {
        *slot = i as u8;
    }
    map
}

impl SelectionPolicy {
    /// Nothing selected, nothing invalid, identity remaps, no size limit.
    pub fn new() -> Self {
        SelectionPolicy {
            streams: IdSet::empty(),
            substreams: IdSet::empty(),
            invalid: IdSet::empty(),
            stream_map: identity_map(),
            substream_map: identity_map(),
            packet_max: 0,
        }
    }

    /// Selects every stream and every substream.
    pub fn select_all(&mut self) {
        self.streams = IdSet::full();
        self.substreams = IdSet::full();
    }

    /// Selected stream ids.
    pub fn streams(&self) -> &IdSet {
        &self.streams
    }

    /// Mutable access to the selected stream ids.
    pub fn streams_mut(&mut self) -> &mut IdSet {
        &mut self.streams
    }

    /// Selected private stream 1 substream ids.
    pub fn substreams(&self) -> &IdSet {
        &self.substreams
    }

    /// Mutable access to the selected substream ids.
    pub fn substreams_mut(&mut self) -> &mut IdSet {
        &mut self.substreams
    }

    /// Stream ids whose packet headers are treated as bogus.
    pub fn invalid(&self) -> &IdSet {
        &self.invalid
    }

    /// Mutable access to the invalid stream ids.
    pub fn invalid_mut(&mut self) -> &mut IdSet {
        &mut self.invalid
    }

    /// Marks every currently unselected stream as invalid and every selected
    /// one as valid.
    pub fn invalidate_unselected(&mut self) {
        for id in 0..=u8::MAX {
            if self.streams.contains(id) {
                self.invalid.remove(id);
            } else {
                self.invalid.insert(id);
            }
        }
    }

    /// Writes stream `from` as `to` on output.
    pub fn map_stream(&mut self, from: u8, to: u8) {
        self.stream_map[usize::from(from)] = to;
    }

    /// Writes substream `from` as `to` on output.
    pub fn map_substream(&mut self, from: u8, to: u8) {
        self.substream_map[usize::from(from)] = to;
    }

    /// Output id for stream `sid`.
    pub fn stream_id(&self, sid: u8) -> u8 {
        self.stream_map[usize::from(sid)]
    }

    /// Output id for substream `ssid`.
    pub fn substream_id(&self, ssid: u8) -> u8 {
        self.substream_map[usize::from(ssid)]
    }

    /// Packets announcing more than `max` bytes are rejected; 0 disables the limit.
    pub fn set_packet_max(&mut self, max: usize) {
        self.packet_max = max;
    }

    /// Largest accepted packet size, 0 if unlimited.
    pub fn packet_max(&self) -> usize {
        self.packet_max
    }

    /// True if the packet's stream (or substream, for private stream 1) is
    /// not selected.
    pub fn is_excluded(&self, packet: &PacketRecord) -> bool {
        if !self.streams.contains(packet.sid) {
            return true;
        }
        packet.is_private_stream_1() && !self.substreams.contains(packet.ssid)
    }

    /// True if the parser should treat the packet header as bogus and resync.
    ///
    /// A private stream 1 packet too short to hold its substream id byte is
    /// rejected as well.
    pub fn is_invalid(&self, packet: &PacketRecord) -> bool {
        if self.packet_max > 0 && packet.size > self.packet_max {
            return true;
        }
        if self.invalid.contains(packet.sid) {
            return true;
        }
        packet.sid == SID_PRIVATE_STREAM_1 && packet.offset >= packet.size
    }

    /// Stops selecting the id a packet belongs to: the substream for
    /// private stream 1, the stream otherwise.
    pub fn deselect(&mut self, packet: &PacketRecord) {
        if packet.is_private_stream_1() {
            self.substreams.remove(packet.ssid);
        } else {
            self.streams.remove(packet.sid);
        }
    }
}
