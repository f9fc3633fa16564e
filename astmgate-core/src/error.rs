/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the AstmGate gateway.
//!
//! This module provides a unified error hierarchy using `thiserror` for typed,
//! domain-specific errors across all AstmGate operations.
//!
//! Frame-level errors never leave the session: they are answered with NAK on
//! the wire. Everything else surfaces through [`GatewayError`].

use thiserror::Error;

/// Result type alias using [`GatewayError`] as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for all AstmGate operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Error in the low-level frame codec.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Error in transport session operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in a message sink.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid gateway configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error from the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur while decoding an STX frame.
///
/// Each variant maps to a NAK on the wire; none of them tears the
/// connection down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Checksum mismatch between calculated and declared values.
    #[error("checksum mismatch: calculated {calculated:02X}, declared {declared:02X}")]
    BadChecksum {
        /// Calculated checksum value.
        calculated: u8,
        /// Declared checksum value in the frame.
        declared: u8,
    },

    /// Byte layout violation: bad trailer, stray bytes, oversized frame.
    #[error("bad framing: {0}")]
    BadFraming(&'static str),

    /// Frame number byte outside ASCII `'0'..='7'`.
    #[error("bad frame number byte: 0x{0:02X}")]
    BadFrameNumber(u8),
}

/// Errors in transport session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Too many consecutive NAK exchanges on the same frame.
    #[error("nak limit exceeded after {count} consecutive rejections")]
    NakLimitExceeded {
        /// Number of consecutive rejections observed.
        count: u32,
    },

    /// Peer never answered the establishment ENQ.
    #[error("establishment failed after {attempts} attempts")]
    EstablishmentFailed {
        /// Number of ENQ attempts made.
        attempts: u32,
    },

    /// Peer closed the connection mid-transfer.
    #[error("peer disconnected during transfer")]
    PeerDisconnected,
}

/// Errors in message sink operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// File sink I/O failure.
    #[error("file sink i/o error: {0}")]
    Io(String),

    /// HTTP request failed at the transport level.
    #[error("http transport error: {0}")]
    Http(String),

    /// HTTP endpoint answered with a non-2xx status.
    #[error("push rejected with status {status}")]
    Rejected {
        /// The HTTP status code returned.
        status: u16,
    },

    /// All delivery attempts were used up.
    #[error("push failed after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Errors in gateway configuration, fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Listen address could not be parsed.
    #[error("invalid listen address: {0}")]
    InvalidListenAddr(String),

    /// Output directory does not exist or is not a directory.
    #[error("output path is not an existing directory: {0}")]
    OutputDirMissing(String),

    /// LIS URL could not be parsed.
    #[error("invalid lis url: {0}")]
    InvalidUrl(String),

    /// Input file holds no records.
    #[error("no records in input: {0}")]
    EmptyInput(String),
}
