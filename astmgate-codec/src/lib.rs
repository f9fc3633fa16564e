/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate Codec
//!
//! Byte-level codec for the ASTM E1381 low-level protocol.
//!
//! This crate turns raw transport bytes into frames and control characters
//! and back:
//! - [`checksum`]: the modulo-256 frame checksum and its two-character
//!   hex rendering
//! - [`decoder`]: incremental scanning of a growing byte buffer into
//!   [`WireEvent`]s
//! - [`encoder`]: frame assembly, including ETB splitting of records that
//!   exceed the payload bound
//!
//! The codec is pure: no I/O, no session state. The session layer decides
//! what a frame means; the codec only vouches for its shape and checksum.

pub mod checksum;
pub mod decoder;
pub mod encoder;

pub use checksum::{format_checksum, frame_checksum, parse_checksum};
pub use decoder::{Frame, WireEvent, decode_wire};
pub use encoder::{encode_frame, split_record};
