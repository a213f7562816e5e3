use std::env;
use std::fs;
use std::path::Path;

use crate::error::{PsError, Result};
use crate::format::ps::select::IdSet;

/// Environment variable supplying the output name template when none was
/// given explicitly.
pub const BASE_NAME_ENV: &str = "PSDEMUX_BASE_NAME";

/// Behavior switches shared by the mode handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Omit system headers after the first (Remux) or from listings (List).
    pub no_system_headers: bool,
    /// Omit packs from listings.
    pub no_packs: bool,
    /// Omit packets from listings.
    pub no_packets: bool,
    /// Omit end codes from listings and output.
    pub no_end: bool,
    /// Copy bytes discarded during resynchronization to the remux output.
    pub remux_skipped: bool,
    /// Write every pack header, even when no packet follows it.
    pub empty_packs: bool,
    /// Start a new remux output file after every end code.
    pub split: bool,
    /// Drop packets that end before their announced size.
    pub drop_incomplete: bool,
    /// Strip the 3-byte DVD AC-3 header after the substream id.
    pub dvd_ac3: bool,
    /// Re-frame DVD subtitle substreams with per-unit timestamps.
    pub dvd_subtitles: bool,
    /// Report every packet whose PTS lowers the running minimum.
    pub first_pts: bool,
    /// Output file name template; `#` characters become hex id digits.
    pub base_name: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            no_system_headers: false,
            no_packs: false,
            no_packets: false,
            no_end: false,
            remux_skipped: false,
            empty_packs: false,
            split: false,
            drop_incomplete: true,
            dvd_ac3: false,
            dvd_subtitles: false,
            first_pts: false,
            base_name: None,
        }
    }
}

impl Options {
    /// Default options: drop incomplete packets, everything else off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills unset values from the environment.
    pub fn apply_env(&mut self) {
        if self.base_name.is_none() {
            if let Ok(name) = env::var(BASE_NAME_ENV) {
                if !name.is_empty() {
                    self.base_name = Some(name);
                }
            }
        }
    }

    /// Applies `key = value` lines from a configuration file.
    ///
    /// Keys are the field names of [`Options`]. Blank lines and lines
    /// starting with `#` are ignored.
    pub fn apply_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.apply_str(&content)
    }

    /// Applies `key = value` lines from an in-memory configuration.
    pub fn apply_str(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(PsError::Config(format!("malformed line: {}", line)));
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');

            if key == "base_name" {
                self.base_name = (!value.is_empty()).then(|| value.to_string());
                continue;
            }

            let flag = match value {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(PsError::Config(format!(
                        "expected a boolean for {}: {}",
                        key, value
                    )))
                }
            };

            match key {
                "no_system_headers" => self.no_system_headers = flag,
                "no_packs" => self.no_packs = flag,
                "no_packets" => self.no_packets = flag,
                "no_end" => self.no_end = flag,
                "remux_skipped" => self.remux_skipped = flag,
                "empty_packs" => self.empty_packs = flag,
                "split" => self.split = flag,
                "drop_incomplete" => self.drop_incomplete = flag,
                "dvd_ac3" => self.dvd_ac3 = flag,
                "dvd_subtitles" => self.dvd_subtitles = flag,
                "first_pts" => self.first_pts = flag,
                _ => log::warn!("ignoring unknown config key: {}", key),
            }
        }
        Ok(())
    }
}

/// Parses an unsigned integer with C-style radix detection: `0x` prefix
/// for hexadecimal, a leading `0` for octal, decimal otherwise.
pub fn parse_number(text: &str) -> Result<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return Ok(u32::from_str_radix(hex, 16)?);
    }
    if text.len() > 1 && text.starts_with('0') {
        return Ok(u32::from_str_radix(&text[1..], 8)?);
    }
    Ok(text.parse::<u32>()?)
}

// Scans one number at the start of `text`, returning it and the bytes used.
fn scan_number(text: &[u8]) -> Option<(u32, usize)> {
    let (radix, start) = match text {
        [b'0', b'x' | b'X', d, ..] if d.is_ascii_hexdigit() => (16, 2),
        [b'0', ..] => (8, 0),
        [d, ..] if d.is_ascii_digit() => (10, 0),
        _ => return None,
    };

    let mut value: u32 = 0;
    let mut end = start;
    while let Some(digit) = text.get(end).and_then(|&b| char::from(b).to_digit(radix)) {
        value = value.checked_mul(radix)?.checked_add(digit)?;
        end += 1;
    }
    Some((value, end))
}

/// Applies a stream-set expression to `set`.
///
/// The expression is a list of terms separated by whitespace or `/`. Each
/// term may be prefixed with `+` (add, the default) or `-` (remove) and is
/// one of `all`, `none` (all with the sign inverted), a single id `N` or an
/// inclusive range `N-M`. Numbers follow [`parse_number`] syntax.
///
/// ```
/// use psdemux::config::apply_stream_set;
/// use psdemux::format::ps::IdSet;
///
/// let mut set = IdSet::empty();
/// apply_stream_set("0xe0-0xef/-0xe1 0xbd", &mut set).unwrap();
/// assert!(set.contains(0xe0));
/// assert!(!set.contains(0xe1));
/// assert!(set.contains(0xbd));
/// ```
pub fn apply_stream_set(expr: &str, set: &mut IdSet) -> Result<()> {
    let bytes = expr.as_bytes();
    let invalid = || PsError::InvalidStreamSet(expr.to_string());
    let mut pos = 0;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let mut include = true;
        match bytes[pos] {
            b'+' => pos += 1,
            b'-' => {
                include = false;
                pos += 1;
            }
            _ => {}
        }

        let (lo, hi) = if bytes[pos..].starts_with(b"all") {
            pos += 3;
            (0, 255)
        } else if bytes[pos..].starts_with(b"none") {
            pos += 4;
            include = !include;
            (0, 255)
        } else {
            let (lo, used) = scan_number(&bytes[pos..]).ok_or_else(invalid)?;
            pos += used;
            let hi = if bytes.get(pos) == Some(&b'-') {
                pos += 1;
                let (hi, used) = scan_number(&bytes[pos..]).ok_or_else(invalid)?;
                pos += used;
                hi
            } else {
                lo
            };
            (lo, hi)
        };

        if lo > hi || hi > 255 {
            return Err(invalid());
        }
        set.set_range(lo as u8, hi as u8, include);

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => break,
            Some(b'/') => pos += 1,
            Some(b'+' | b'-') => {}
            Some(c)
                if c.is_ascii_alphanumeric()
                    && pos > 0
                    && bytes[pos - 1].is_ascii_whitespace() => {}
            Some(_) => return Err(invalid()),
        }
    }

    Ok(())
}
