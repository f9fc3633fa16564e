/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! ASTM frame encoder.
//!
//! Builds `STX FN data (ETX|ETB) C1 C2 CR LF` frames and splits records
//! that exceed the payload bound across ETB-continued frames. The checksum
//! is always computed from the bytes just laid out, so an encoded frame is
//! verified by construction.

use astmgate_core::types::{CR, ETB, ETX, FrameNumber, LF, MAX_FRAME_PAYLOAD, STX};
use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::{format_checksum, frame_checksum};

/// Encodes one frame.
///
/// # Arguments
/// * `number` - The frame number to carry in the FN position
/// * `data` - The payload; at most [`MAX_FRAME_PAYLOAD`] bytes
/// * `terminal` - True for an ETX frame, false for an ETB continuation
///
/// # Panics
/// Panics in debug builds if `data` exceeds the payload bound; use
/// [`split_record`] for arbitrary record lengths.
#[must_use]
pub fn encode_frame(number: FrameNumber, data: &[u8], terminal: bool) -> Bytes {
    debug_assert!(data.len() <= MAX_FRAME_PAYLOAD);

    let mut buf = BytesMut::with_capacity(data.len() + 7);
    buf.put_u8(STX);
    buf.put_u8(number.as_ascii());
    buf.put_slice(data);
    buf.put_u8(if terminal { ETX } else { ETB });

    let checksum = frame_checksum(&buf[1..]);
    buf.put_slice(&format_checksum(checksum));
    buf.put_u8(CR);
    buf.put_u8(LF);
    buf.freeze()
}

/// Encodes one CR-terminated record as a sequence of frames.
///
/// The record text (without its CR) is terminated and chunked into payloads
/// of at most [`MAX_FRAME_PAYLOAD`] bytes; every chunk but the last is an
/// ETB continuation. The frame counter is advanced once per emitted frame,
/// so consecutive records share one numbering sequence.
///
/// # Arguments
/// * `counter` - The last used frame number; updated in place
/// * `record` - The record text, CR excluded
#[must_use]
pub fn split_record(counter: &mut FrameNumber, record: &[u8]) -> Vec<Bytes> {
    let mut payload = Vec::with_capacity(record.len() + 1);
    payload.extend_from_slice(record);
    payload.push(CR);

    let chunks: Vec<&[u8]> = payload.chunks(MAX_FRAME_PAYLOAD).collect();
    let last = chunks.len() - 1;

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            *counter = counter.next();
            encode_frame(*counter, chunk, i == last)
        })
        .collect()
}
