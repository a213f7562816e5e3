//! # MPEG Program Stream
//!
//! Single-pass parsing of MPEG-1 and MPEG-2 program streams (ISO/IEC 11172-1
//! and 13818-1 PS) and the four processing modes built on it.
//!
//! The [`PsParser`] walks the input once, decoding pack headers, system
//! headers and packet headers, and hands each unit to a
//! [`Handler`](crate::format::Handler):
//!
//! - [`Scan`]: first packet of every stream and the run statistics
//! - [`List`]: one line per unit
//! - [`Remux`]: rewrite the stream keeping selected packets
//! - [`Demux`]: write each stream's payload to its own output
//!
//! Which packets a mode processes is decided by a [`SelectionPolicy`].

use std::io::{Read, Write};

use crate::config::Options;
use crate::error::Result;

/// Per-stream payload extraction
pub mod demux;
/// Unit-by-unit listing
pub mod list;
/// Output file name templates
pub mod naming;
/// The parse engine
pub mod parser;
/// Packet header extension decoding
pub mod pes;
/// Stream rewriting
pub mod remux;
/// First-packet report
pub mod scan;
/// Stream selection and validity policy
pub mod select;
/// DVD subtitle framing
pub mod spu;
/// Records, start codes and statistics
pub mod types;

pub use demux::Demux;
pub use list::List;
pub use parser::PsParser;
pub use remux::Remux;
pub use scan::Scan;
pub use select::{IdSet, SelectionPolicy};
pub use spu::SubtitleRepacketizer;
pub use types::*;

/// Processing mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Report the first packet of every stream.
    #[default]
    Scan,
    /// Print every unit.
    List,
    /// Rewrite the stream with selected packets.
    Remux,
    /// Extract stream payloads.
    Demux,
}

/// Processes `input` in the given mode, writing to `output`.
///
/// Returns the statistics of the run. Demux may remove ids from `policy`
/// whose output file could not be created.
pub fn run<R: Read, W: Write>(
    mode: Mode,
    input: R,
    output: W,
    policy: &mut SelectionPolicy,
    options: &Options,
) -> Result<Statistics> {
    log::debug!("starting {:?} run", mode);

    let stats = match mode {
        Mode::Scan => Scan::new(output, policy, options).run(input)?,
        Mode::List => List::new(output, policy, options).run(input)?,
        Mode::Remux => Remux::new(output, policy, options).run(input)?,
        Mode::Demux => Demux::new(output, policy, options).run(input)?,
    };

    log::debug!(
        "{:?} run done: {} packs, {} packets, {} bytes skipped",
        mode,
        stats.packs,
        stats.packets,
        stats.skipped
    );
    Ok(stats)
}
