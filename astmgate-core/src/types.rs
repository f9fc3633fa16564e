/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core types for ASTM protocol operations.
//!
//! This module provides fundamental types used throughout the AstmGate engine:
//! - Control byte constants of the E1381 low-level protocol
//! - [`FrameNumber`]: the modulo-8 frame sequence counter
//! - [`Delimiters`]: the E1394 delimiter set discovered from a header record
//! - [`AstmTimestamp`]: normalized `YYYYMMDDhhmmss` timestamp fields

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ENQ control byte: establishment request.
pub const ENQ: u8 = 0x05;
/// ACK control byte: positive acknowledgement.
pub const ACK: u8 = 0x06;
/// NAK control byte: negative acknowledgement.
pub const NAK: u8 = 0x15;
/// STX control byte: start of frame.
pub const STX: u8 = 0x02;
/// ETX control byte: end of a terminal frame.
pub const ETX: u8 = 0x03;
/// ETB control byte: end of an intermediate frame.
pub const ETB: u8 = 0x17;
/// EOT control byte: end of transmission.
pub const EOT: u8 = 0x04;
/// Carriage return, the record terminator.
pub const CR: u8 = 0x0D;
/// Line feed, the frame trailer byte.
pub const LF: u8 = 0x0A;

/// Maximum payload bytes per frame.
///
/// E1381 bounds a frame at 247 bytes total; subtracting STX, the frame
/// number, the terminator, two checksum characters, and CR LF leaves 240
/// bytes of record data.
pub const MAX_FRAME_PAYLOAD: usize = 240;

/// Maximum total frame length in bytes.
pub const MAX_FRAME_LEN: usize = MAX_FRAME_PAYLOAD + 7;

/// Returns true for the single-byte link control characters that appear
/// outside frames (ENQ, ACK, NAK, EOT).
#[inline]
#[must_use]
pub const fn is_link_control(byte: u8) -> bool {
    matches!(byte, ENQ | ACK | NAK | EOT)
}

/// ASTM frame number.
///
/// Frame numbers are a single ASCII digit `'0'..='7'` cycling modulo 8.
/// The counter resets to 0 on establishment, so the first frame of a
/// transfer carries number 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct FrameNumber(u8);

impl FrameNumber {
    /// The counter value after establishment, before the first frame.
    pub const ZERO: Self = Self(0);

    /// Creates a frame number, wrapping the value modulo 8.
    #[inline]
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value % 8)
    }

    /// Parses a frame number from its ASCII digit byte.
    ///
    /// # Returns
    /// `Some(FrameNumber)` for `'0'..='7'`, `None` otherwise.
    #[inline]
    #[must_use]
    pub const fn from_ascii(byte: u8) -> Option<Self> {
        if byte >= b'0' && byte <= b'7' {
            Some(Self(byte - b'0'))
        } else {
            None
        }
    }

    /// Returns the ASCII digit byte for this frame number.
    #[inline]
    #[must_use]
    pub const fn as_ascii(self) -> u8 {
        b'0' + self.0
    }

    /// Returns the raw counter value (0..=7).
    #[inline]
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the next frame number, wrapping 7 back to 0.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % 8)
    }
}

impl Default for FrameNumber {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The E1394 delimiter set of one session.
///
/// The four bytes following the `H` type code of a header record define, in
/// order, the field, repeat, and component separators and the escape
/// introducer. The escape byte doubles as the subcomponent separator when it
/// does not open a recognized escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    /// Field separator, conventionally `|`.
    pub field: u8,
    /// Repeat separator, conventionally `\`.
    pub repeat: u8,
    /// Component separator, conventionally `^`.
    pub component: u8,
    /// Escape introducer and subcomponent separator, conventionally `&`.
    pub escape: u8,
}

impl Delimiters {
    /// Reads the delimiter set from a raw header record.
    ///
    /// # Arguments
    /// * `record` - The raw header record, starting with the `H` type code
    ///
    /// # Returns
    /// `Some(Delimiters)` if the record carries four distinct, printable
    /// delimiter bytes, `None` otherwise.
    #[must_use]
    pub fn from_header(record: &[u8]) -> Option<Self> {
        if record.len() < 5 || record[0] != b'H' {
            return None;
        }
        let d = Self {
            field: record[1],
            repeat: record[2],
            component: record[3],
            escape: record[4],
        };
        let bytes = [d.field, d.repeat, d.component, d.escape];
        let printable = bytes.iter().all(|b| b.is_ascii_graphic());
        let distinct = (1..bytes.len()).all(|i| !bytes[..i].contains(&bytes[i]));
        (printable && distinct).then_some(d)
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: b'|',
            repeat: b'\\',
            component: b'^',
            escape: b'&',
        }
    }
}

/// A normalized ASTM timestamp field.
///
/// E1394 date/time fields are formatted `YYYYMMDDhhmmss` with optional
/// truncation after the date part. Values that look like a timestamp but do
/// not name a real instant are kept raw and flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AstmTimestamp {
    /// Successfully normalized timestamp.
    DateTime(NaiveDateTime),
    /// Malformed candidate, kept verbatim.
    Raw(String),
}

impl AstmTimestamp {
    /// Parses an ASTM date/time field.
    ///
    /// Accepted shapes are `YYYYMMDD`, `YYYYMMDDhh`, `YYYYMMDDhhmm`, and
    /// `YYYYMMDDhhmmss`; truncated time parts default to zero.
    ///
    /// # Arguments
    /// * `value` - The raw field text
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if !matches!(value.len(), 8 | 10 | 12 | 14) || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Self::Raw(value.to_string());
        }

        let date = match NaiveDate::parse_from_str(&value[..8], "%Y%m%d") {
            Ok(d) => d,
            Err(_) => return Self::Raw(value.to_string()),
        };

        let digits = |range: std::ops::Range<usize>| -> u32 {
            value[range].parse().unwrap_or(0)
        };
        let hour = if value.len() >= 10 { digits(8..10) } else { 0 };
        let minute = if value.len() >= 12 { digits(10..12) } else { 0 };
        let second = if value.len() >= 14 { digits(12..14) } else { 0 };

        match date.and_hms_opt(hour, minute, second) {
            Some(dt) => Self::DateTime(dt),
            None => Self::Raw(value.to_string()),
        }
    }

    /// Returns true if the value could not be normalized.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Returns the normalized timestamp, if any.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            Self::Raw(_) => None,
        }
    }
}

impl fmt::Display for AstmTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y%m%d%H%M%S")),
            Self::Raw(s) => write!(f, "{}", s),
        }
    }
}
