use std::num::ParseIntError;
use thiserror::Error;

/// Errors raised while parsing or writing a program stream.
#[derive(Error, Debug)]
pub enum PsError {
    /// Read or write failure on the input or an output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A unit ended before its announced size.
    #[error("incomplete unit (sid={sid:02x} size={got}/{expected})")]
    IncompleteUnit {
        /// Stream id or start code byte of the unit.
        sid: u8,
        /// Bytes actually read.
        got: usize,
        /// Bytes the header announced.
        expected: usize,
    },

    /// A private stream 1 packet too small for the bytes that must be skipped.
    #[error("packet too small (sid={sid:02x} size={size})")]
    Undersized {
        /// Stream id of the packet.
        sid: u8,
        /// Announced packet size.
        size: usize,
    },

    /// A subtitle unit announced a length that cannot hold its own header.
    #[error("invalid subtitle unit length: {0}")]
    SubtitleLength(u32),

    /// A seek targeted a position before the current offset.
    #[error("cannot seek backwards from {current} to {target}")]
    BackwardSeek {
        /// Offset at the time of the seek.
        current: u64,
        /// Requested offset.
        target: u64,
    },

    /// The input ended inside a unit being skipped or copied.
    #[error("input ended inside a unit")]
    Truncated,

    /// A stream set expression could not be parsed.
    #[error("invalid stream set: {0}")]
    InvalidStreamSet(String),

    /// A configuration file line or value was rejected.
    #[error("config error: {0}")]
    Config(String),

    /// A numeric option failed to parse.
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, PsError>;
