/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate Core
//!
//! Core types, traits, and error definitions for the AstmGate ASTM gateway.
//!
//! This crate provides the fundamental building blocks used across all
//! AstmGate crates:
//! - **Error types**: Unified error handling with `thiserror`
//! - **Protocol types**: Control bytes, `FrameNumber`, `Delimiters`
//! - **Record types**: `Record`, `Field`, `Message`, and `RecordType`
//! - **Timestamps**: `AstmTimestamp` normalization of E1394 date/time fields
//!
//! ## Layering
//!
//! The low-level transport (ASTM E1381) deals in frames and control bytes;
//! the record level (ASTM E1394 / LIS2-A) deals in delimited records grouped
//! into header-to-terminator messages. Both vocabularies live here so that
//! the codec, session, and dispatch crates share one set of definitions.

pub mod error;
pub mod record;
pub mod types;

pub use error::{ConfigError, FrameError, GatewayError, Result, SessionError, SinkError};
pub use record::{Field, Message, Record, RecordType};
pub use types::{
    ACK, AstmTimestamp, CR, Delimiters, ENQ, EOT, ETB, ETX, FrameNumber, LF,
    MAX_FRAME_LEN, MAX_FRAME_PAYLOAD, NAK, STX, is_link_control,
};
