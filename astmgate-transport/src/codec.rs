/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tokio codec for ASTM wire framing.
//!
//! This module adapts the pure [`decode_wire`] scanner to the
//! `tokio_util::codec` interface so that a session runner can drive a
//! `Framed<TcpStream, AstmWireCodec>` stream of [`WireEvent`]s.

use astmgate_codec::{WireEvent, decode_wire};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Tokio codec for ASTM wire framing.
///
/// Decoding yields control bytes, verified frames, and corrupt units alike;
/// only genuine socket errors terminate the stream. Encoding writes
/// pre-assembled bytes (single control characters or whole frames) verbatim.
#[derive(Debug, Clone, Default)]
pub struct AstmWireCodec;

impl AstmWireCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Decoder for AstmWireCodec {
    type Item = WireEvent;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match decode_wire(src) {
            WireEvent::NeedMore => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

impl Encoder<Bytes> for AstmWireCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}
