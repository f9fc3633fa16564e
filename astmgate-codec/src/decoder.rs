/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Incremental ASTM wire decoder.
//!
//! [`decode_wire`] scans a growing byte buffer and lifts it into
//! [`WireEvent`]s one at a time. The decoder consumes exactly the bytes of
//! each event it reports: a control byte, a complete frame (well-formed or
//! not), or a run of junk. Incomplete input consumes nothing and yields
//! [`WireEvent::NeedMore`].
//!
//! A frame is `STX FN data (ETX|ETB) C1 C2 CR LF`. Validation order follows
//! the byte layout: trailer and checksum characters first, then the checksum
//! value, then the frame number digit.

use astmgate_core::types::{
    CR, ETB, ETX, FrameNumber, LF, MAX_FRAME_LEN, STX, is_link_control,
};
use astmgate_core::FrameError;
use bytes::{Buf, Bytes, BytesMut};
use memchr::memchr2;

/// One decoded transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame number carried in the FN position.
    pub number: FrameNumber,
    /// The frame payload, between FN and the terminator.
    pub data: Bytes,
    /// True for ETX (terminal frame), false for ETB (intermediate frame).
    pub terminal: bool,
}

/// One unit of decoded wire input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// The buffer holds no complete unit yet; nothing was consumed.
    NeedMore,
    /// A single link control byte (ENQ, ACK, NAK, EOT).
    Control(u8),
    /// A verified frame.
    Frame(Frame),
    /// A malformed unit; the offending bytes were consumed.
    Corrupt(FrameError),
}

/// Decodes the next wire unit from the front of `buf`.
///
/// Consumes exactly the bytes of the reported event. Call in a loop until
/// [`WireEvent::NeedMore`] is returned.
///
/// # Arguments
/// * `buf` - The receive buffer; decoded bytes are split off the front
#[must_use]
pub fn decode_wire(buf: &mut BytesMut) -> WireEvent {
    let Some(&first) = buf.first() else {
        return WireEvent::NeedMore;
    };

    if is_link_control(first) {
        buf.advance(1);
        return WireEvent::Control(first);
    }

    if first != STX {
        // Junk run: everything up to the next recognizable byte.
        let run = buf
            .iter()
            .position(|&b| b == STX || is_link_control(b))
            .unwrap_or(buf.len());
        buf.advance(run);
        return WireEvent::Corrupt(FrameError::BadFraming("bytes outside frame"));
    }

    // Frame candidate. Locate the ETX/ETB terminator after the STX.
    let Some(rel) = memchr2(ETX, ETB, &buf[1..]) else {
        if buf.len() > MAX_FRAME_LEN {
            // No terminator within the protocol bound; drop the STX and
            // let the scanner resynchronize.
            buf.advance(1);
            return WireEvent::Corrupt(FrameError::BadFraming("unterminated frame"));
        }
        return WireEvent::NeedMore;
    };
    let term = 1 + rel;
    let frame_len = term + 5;

    if buf.len() < frame_len {
        return WireEvent::NeedMore;
    }

    let frame = buf.split_to(frame_len).freeze();

    if term < 2 {
        return WireEvent::Corrupt(FrameError::BadFraming("frame too short"));
    }
    if frame_len > MAX_FRAME_LEN {
        return WireEvent::Corrupt(FrameError::BadFraming("frame exceeds maximum length"));
    }
    if frame[term + 3] != CR || frame[term + 4] != LF {
        return WireEvent::Corrupt(FrameError::BadFraming("missing CR LF trailer"));
    }
    let Some(declared) = crate::checksum::parse_checksum(&frame[term + 1..term + 3]) else {
        return WireEvent::Corrupt(FrameError::BadFraming("checksum characters not hex"));
    };

    let calculated = crate::checksum::frame_checksum(&frame[1..=term]);
    if calculated != declared {
        return WireEvent::Corrupt(FrameError::BadChecksum {
            calculated,
            declared,
        });
    }

    let Some(number) = FrameNumber::from_ascii(frame[1]) else {
        return WireEvent::Corrupt(FrameError::BadFrameNumber(frame[1]));
    };

    WireEvent::Frame(Frame {
        number,
        data: frame.slice(2..term),
        terminal: frame[term] == ETX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_frame;
    use astmgate_core::types::{ACK, ENQ, EOT};

    fn buf_of(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn test_decode_empty() {
        let mut buf = BytesMut::new();
        assert_eq!(decode_wire(&mut buf), WireEvent::NeedMore);
    }

    #[test]
    fn test_decode_control_bytes() {
        let mut buf = buf_of(&[ENQ, EOT, ACK]);
        assert_eq!(decode_wire(&mut buf), WireEvent::Control(ENQ));
        assert_eq!(decode_wire(&mut buf), WireEvent::Control(EOT));
        assert_eq!(decode_wire(&mut buf), WireEvent::Control(ACK));
        assert_eq!(decode_wire(&mut buf), WireEvent::NeedMore);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_valid_frame() {
        let encoded = encode_frame(FrameNumber::new(1), b"H|\\^&|||cobas\r", true);
        let mut buf = buf_of(&encoded);

        match decode_wire(&mut buf) {
            WireEvent::Frame(frame) => {
                assert_eq!(frame.number, FrameNumber::new(1));
                assert_eq!(&frame.data[..], b"H|\\^&|||cobas\r");
                assert!(frame.terminal);
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_intermediate_frame() {
        let encoded = encode_frame(FrameNumber::new(3), b"partial", false);
        let mut buf = buf_of(&encoded);

        match decode_wire(&mut buf) {
            WireEvent::Frame(frame) => assert!(!frame.terminal),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let encoded = encode_frame(FrameNumber::new(1), b"P|1\r", true);
        let mut buf = buf_of(&encoded[..encoded.len() - 3]);

        assert_eq!(decode_wire(&mut buf), WireEvent::NeedMore);
        assert_eq!(buf.len(), encoded.len() - 3);
    }

    #[test]
    fn test_decode_bad_checksum() {
        let mut encoded = encode_frame(FrameNumber::new(1), b"P|1\r", true).to_vec();
        let cs_pos = encoded.len() - 4;
        encoded[cs_pos] = if encoded[cs_pos] == b'0' { b'1' } else { b'0' };
        let mut buf = buf_of(&encoded);

        assert!(matches!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadChecksum { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_bad_frame_number() {
        // A flipped FN byte first fails the checksum; a frame whose checksum
        // covers the bad digit reports BadFrameNumber.
        let mut raw = vec![STX, b'9'];
        raw.extend_from_slice(b"P|1\r");
        raw.push(ETX);
        let cs = crate::checksum::frame_checksum(&raw[1..]);
        raw.extend_from_slice(&crate::checksum::format_checksum(cs));
        raw.extend_from_slice(&[CR, LF]);
        let mut buf = buf_of(&raw);

        assert_eq!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadFrameNumber(b'9'))
        );
    }

    #[test]
    fn test_decode_missing_trailer() {
        let mut encoded = encode_frame(FrameNumber::new(1), b"P|1\r", true).to_vec();
        let lf_pos = encoded.len() - 1;
        encoded[lf_pos] = b'X';
        let mut buf = buf_of(&encoded);

        assert_eq!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadFraming("missing CR LF trailer"))
        );
    }

    #[test]
    fn test_decode_junk_run_consumed_exactly() {
        let encoded = encode_frame(FrameNumber::new(1), b"P|1\r", true);
        let mut bytes = b"garbage".to_vec();
        bytes.extend_from_slice(&encoded);
        let mut buf = buf_of(&bytes);

        assert_eq!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadFraming("bytes outside frame"))
        );
        assert!(matches!(decode_wire(&mut buf), WireEvent::Frame(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_unterminated_oversized() {
        let mut bytes = vec![STX];
        bytes.extend_from_slice(&vec![b'A'; MAX_FRAME_LEN + 10]);
        let mut buf = buf_of(&bytes);

        assert_eq!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadFraming("unterminated frame"))
        );
        // Only the STX is dropped; the rest is reported as junk next.
        assert_eq!(buf.len(), MAX_FRAME_LEN + 10);
        assert_eq!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadFraming("bytes outside frame"))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_roundtrip_all_frame_numbers() {
        for v in 0..8u8 {
            for terminal in [true, false] {
                let number = FrameNumber::new(v);
                let data = format!("R|{}|^^^GLU|5.5|mmol/L\r", v);
                let encoded = encode_frame(number, data.as_bytes(), terminal);
                let mut buf = buf_of(&encoded);

                match decode_wire(&mut buf) {
                    WireEvent::Frame(frame) => {
                        assert_eq!(frame.number, number);
                        assert_eq!(&frame.data[..], data.as_bytes());
                        assert_eq!(frame.terminal, terminal);
                    }
                    other => panic!("expected frame, got {:?}", other),
                }
                assert!(buf.is_empty());
            }
        }
    }

    #[test]
    fn test_single_byte_corruption_is_caught() {
        let encoded = encode_frame(FrameNumber::new(2), b"O|1|SAMPLE-1\r", true);

        // Flip every byte except STX and the CR LF trailer; each corruption
        // must surface as a frame error of some kind, never a valid frame.
        for pos in 1..encoded.len() - 2 {
            let mut corrupted = encoded.to_vec();
            corrupted[pos] ^= 0x01;
            // Skip mutations that re-introduce structural bytes and shift
            // the frame boundary itself.
            if corrupted[pos] == STX
                || corrupted[pos] == ETX
                || corrupted[pos] == ETB
                || is_link_control(corrupted[pos])
            {
                continue;
            }
            let mut buf = buf_of(&corrupted);
            match decode_wire(&mut buf) {
                WireEvent::Corrupt(_) => {}
                other => panic!("byte {} corruption not caught: {:?}", pos, other),
            }
        }
    }

    #[test]
    fn test_checksum_error_reports_values() {
        let mut raw = vec![STX, b'1'];
        raw.extend_from_slice(b"Q|1\r");
        raw.push(ETX);
        let good = crate::checksum::frame_checksum(&raw[1..]);
        raw.extend_from_slice(b"00");
        raw.extend_from_slice(&[CR, LF]);
        let mut buf = buf_of(&raw);

        assert_eq!(
            decode_wire(&mut buf),
            WireEvent::Corrupt(FrameError::BadChecksum {
                calculated: good,
                declared: 0,
            })
        );
    }
}
