#![doc(html_root_url = "https://docs.rs/psdemux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # psdemux - MPEG Program Stream toolkit
//!
//! `psdemux` reads MPEG-1 and MPEG-2 program streams (`.mpg`, `.vob`) in a
//! single forward pass and offers four ways of processing them:
//!
//! - **Scan**: report the first packet of every stream with its PTS
//! - **List**: print every pack, system header, packet and end code
//! - **Remux**: rewrite the stream keeping only selected packets, with
//!   optional stream id remapping and output splitting at end codes
//! - **Demux**: extract the payload of each stream to its own file, with
//!   DVD AC-3 header stripping and DVD subtitle framing
//!
//! Every mode ends with a statistics block counting units and bytes per
//! stream.
//!
//! ## Quick Start
//!
//! ```rust
//! use psdemux::config::Options;
//! use psdemux::format::ps::{self, Mode, SelectionPolicy};
//!
//! # fn main() -> psdemux::Result<()> {
//! // A pack header followed by the end code
//! let input: &[u8] = &[
//!     0x00, 0x00, 0x01, 0xBA, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01,
//!     0x00, 0x00, 0x03, 0xF8, 0x00, 0x00, 0x01, 0xB9,
//! ];
//!
//! let mut policy = SelectionPolicy::new();
//! policy.select_all();
//!
//! let mut report = Vec::new();
//! let stats = ps::run(Mode::List, input, &mut report, &mut policy, &Options::new())?;
//! assert_eq!(stats.packs, 1);
//! assert_eq!(stats.end_codes, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: the program stream parser and its processing modes
//! - `config`: run options and stream selection expressions
//! - `error`: error type and result alias
//! - `utils`: bit cursor over the input and output staging buffers

/// Run options and command line value parsing
pub mod config;

/// Error types and utilities
pub mod error;

/// Media format implementations
pub mod format;

/// Bitstream reading and buffer management
pub mod utils;

pub use error::{PsError, Result};
