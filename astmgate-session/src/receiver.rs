/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Receiver role of the transport state machine.
//!
//! The receiver faces an instrument: it answers ENQ, validates frame
//! sequence numbers, assembles ETB-continued records, groups records into
//! header-to-terminator messages, and emits each completed message for
//! dispatch. Frame-level trouble is answered with NAK; repeated trouble on
//! one frame aborts the session with EOT.

use crate::config::SessionConfig;
use crate::fsm::{Action, Phase, SessionEvent, TimerKind, send_control};
use astmgate_codec::Frame;
use astmgate_core::{
    ACK, CR, Delimiters, ENQ, EOT, FrameNumber, Message, NAK, RecordType,
};
use astmgate_records::parse_record;
use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

/// The receiver-side E1381 state machine for one session.
///
/// All state is session-local; the runner that owns this value is the only
/// mutator.
#[derive(Debug)]
pub struct ReceiverFsm {
    config: SessionConfig,
    phase: Phase,
    /// Frame number of the last accepted frame; resets to 0 on ENQ so the
    /// first frame of a transfer carries number 1.
    last_fn: FrameNumber,
    /// Payload of the record currently being assembled across frames.
    record_buf: BytesMut,
    /// Raw records of the message currently being assembled.
    raw_records: Vec<Bytes>,
    message_open: bool,
    delimiters: Delimiters,
    consecutive_naks: u32,
}

impl ReceiverFsm {
    /// Creates a receiver in the idle phase.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            last_fn: FrameNumber::ZERO,
            record_buf: BytesMut::new(),
            raw_records: Vec::new(),
            message_open: false,
            delimiters: Delimiters::default(),
            consecutive_naks: 0,
        }
    }

    /// Returns the current protocol phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the frame number the next accepted frame must carry.
    #[must_use]
    pub const fn expected_frame(&self) -> FrameNumber {
        self.last_fn.next()
    }

    /// Feeds one event into the state machine and returns the actions the
    /// runner must execute, in order.
    pub fn on_event(&mut self, event: SessionEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.phase {
            Phase::Idle | Phase::EstablishmentPending => {
                self.on_idle_event(event, &mut actions);
            }
            Phase::Transfer | Phase::Termination => {
                self.on_transfer_event(event, &mut actions);
            }
        }
        actions
    }

    fn on_idle_event(&mut self, event: SessionEvent, actions: &mut Vec<Action>) {
        match event {
            SessionEvent::Control(ENQ) => {
                debug!("establishment request accepted");
                self.phase = Phase::Transfer;
                self.last_fn = FrameNumber::ZERO;
                self.record_buf.clear();
                self.raw_records.clear();
                self.message_open = false;
                self.consecutive_naks = 0;
                actions.push(send_control(ACK));
                actions.push(Action::ArmTimer(TimerKind::Receive, self.config.t2_receive));
            }
            SessionEvent::Control(EOT) => {}
            SessionEvent::Control(byte) => {
                debug!(byte, "unexpected control byte while idle");
                actions.push(send_control(NAK));
            }
            SessionEvent::Frame(_) | SessionEvent::Corrupt(_) => {
                debug!("input outside an established session");
                actions.push(send_control(NAK));
            }
            SessionEvent::Timer(_) => {}
            SessionEvent::PeerClosed => actions.push(Action::Close),
        }
    }

    fn on_transfer_event(&mut self, event: SessionEvent, actions: &mut Vec<Action>) {
        match event {
            SessionEvent::Control(EOT) => {
                self.discard_in_progress("peer sent EOT");
                self.phase = Phase::Idle;
                actions.push(Action::CancelTimer(TimerKind::Receive));
            }
            SessionEvent::Control(ENQ) => {
                warn!("establishment request during transfer");
                self.reject(actions);
            }
            SessionEvent::Control(byte) => {
                debug!(byte, "stray control byte during transfer");
            }
            SessionEvent::Frame(frame) => self.on_frame(frame, actions),
            SessionEvent::Corrupt(err) => {
                warn!(%err, "corrupt frame");
                self.reject(actions);
            }
            SessionEvent::Timer(TimerKind::Receive) => {
                warn!("receive timer expired mid-transfer");
                self.discard_in_progress("receive timeout");
                self.phase = Phase::Idle;
            }
            SessionEvent::Timer(_) => {}
            SessionEvent::PeerClosed => {
                self.discard_in_progress("peer disconnected");
                actions.push(Action::Close);
            }
        }
    }

    fn on_frame(&mut self, frame: Frame, actions: &mut Vec<Action>) {
        let expected = self.last_fn.next();

        if frame.number == expected {
            let ends_with_cr = match frame.data.last() {
                Some(&byte) => byte == CR,
                None => self.record_buf.last() == Some(&CR),
            };
            if frame.terminal && !ends_with_cr {
                warn!(number = %frame.number, "terminal frame without record terminator");
                self.reject(actions);
                return;
            }

            self.record_buf.extend_from_slice(&frame.data);
            if frame.terminal {
                self.record_buf.truncate(self.record_buf.len() - 1);
                let record = std::mem::take(&mut self.record_buf).freeze();
                self.on_record(record, actions);
            }
            self.last_fn = expected;
            self.consecutive_naks = 0;
            actions.push(send_control(ACK));
            actions.push(Action::ArmTimer(TimerKind::Receive, self.config.t2_receive));
        } else if frame.number == self.last_fn {
            // Retransmit of a frame whose ACK the peer lost.
            debug!(number = %frame.number, "duplicate frame acknowledged");
            self.consecutive_naks = 0;
            actions.push(send_control(ACK));
            actions.push(Action::ArmTimer(TimerKind::Receive, self.config.t2_receive));
        } else {
            warn!(
                got = %frame.number,
                expected = %expected,
                "frame number out of sequence"
            );
            self.reject(actions);
        }
    }

    fn reject(&mut self, actions: &mut Vec<Action>) {
        if self.consecutive_naks >= self.config.max_consecutive_naks {
            warn!(
                count = self.consecutive_naks,
                "nak limit reached; aborting session"
            );
            self.discard_in_progress("nak limit");
            self.phase = Phase::Idle;
            actions.push(send_control(EOT));
            actions.push(Action::Close);
        } else {
            self.consecutive_naks += 1;
            actions.push(send_control(NAK));
        }
    }

    fn on_record(&mut self, record: Bytes, actions: &mut Vec<Action>) {
        let record_type = RecordType::from_byte(record.first().copied().unwrap_or(b' '));

        if record_type == RecordType::Header {
            if self.message_open {
                warn!(
                    dropped = self.raw_records.len(),
                    "header record mid-message; restarting assembly"
                );
                self.raw_records.clear();
            }
            match Delimiters::from_header(&record) {
                Some(delimiters) => self.delimiters = delimiters,
                None => {
                    warn!("header without usable delimiter definition; keeping defaults");
                    self.delimiters = Delimiters::default();
                }
            }
            self.raw_records.push(record);
            self.message_open = true;
            self.phase = Phase::Transfer;
            return;
        }

        if !self.message_open {
            warn!(%record_type, "record outside a message; dropped");
            return;
        }

        self.raw_records.push(record);
        if record_type == RecordType::Terminator {
            let records = self
                .raw_records
                .drain(..)
                .map(|raw| parse_record(&raw, &self.delimiters))
                .collect();
            self.message_open = false;
            self.phase = Phase::Termination;
            actions.push(Action::Dispatch(Message::new(records)));
        }
    }

    fn discard_in_progress(&mut self, reason: &str) {
        if self.message_open || !self.record_buf.is_empty() || !self.raw_records.is_empty() {
            warn!(
                reason,
                records = self.raw_records.len(),
                "discarding in-progress message"
            );
        }
        self.record_buf.clear();
        self.raw_records.clear();
        self.message_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm() -> ReceiverFsm {
        ReceiverFsm::new(SessionConfig::new())
    }

    fn frame(number: u8, data: &[u8], terminal: bool) -> SessionEvent {
        SessionEvent::Frame(Frame {
            number: FrameNumber::new(number),
            data: Bytes::copy_from_slice(data),
            terminal,
        })
    }

    fn corrupt() -> SessionEvent {
        SessionEvent::Corrupt(astmgate_core::FrameError::BadChecksum {
            calculated: 1,
            declared: 2,
        })
    }

    fn sent_byte(actions: &[Action]) -> Option<u8> {
        actions.iter().find_map(|a| match a {
            Action::Send(bytes) if bytes.len() == 1 => Some(bytes[0]),
            _ => None,
        })
    }

    fn dispatched(actions: &[Action]) -> Option<&Message> {
        actions.iter().find_map(|a| match a {
            Action::Dispatch(message) => Some(message),
            _ => None,
        })
    }

    fn establish(fsm: &mut ReceiverFsm) {
        let actions = fsm.on_event(SessionEvent::Control(ENQ));
        assert_eq!(sent_byte(&actions), Some(ACK));
        assert_eq!(fsm.phase(), Phase::Transfer);
    }

    #[test]
    fn test_enq_from_idle() {
        let mut fsm = fsm();
        let actions = fsm.on_event(SessionEvent::Control(ENQ));

        assert_eq!(sent_byte(&actions), Some(ACK));
        assert!(matches!(
            actions[1],
            Action::ArmTimer(TimerKind::Receive, _)
        ));
        assert_eq!(fsm.phase(), Phase::Transfer);
        assert_eq!(fsm.expected_frame(), FrameNumber::new(1));
    }

    #[test]
    fn test_idle_naks_frames() {
        let mut fsm = fsm();
        let actions = fsm.on_event(frame(1, b"P|1\r", true));
        assert_eq!(sent_byte(&actions), Some(NAK));
        assert_eq!(fsm.phase(), Phase::Idle);
    }

    #[test]
    fn test_idle_ignores_eot() {
        let mut fsm = fsm();
        let actions = fsm.on_event(SessionEvent::Control(EOT));
        assert!(actions.is_empty());
        assert_eq!(fsm.phase(), Phase::Idle);
    }

    #[test]
    fn test_full_message_dispatches_once() {
        let mut fsm = fsm();
        establish(&mut fsm);

        let mut dispatch_count = 0;
        let frames: [&[u8]; 4] = [
            b"H|\\^&|||cobas|||||||P|1\r",
            b"P|1\r",
            b"R|1|^^^GLU|5.5|mmol/L\r",
            b"L|1|N\r",
        ];
        for (i, data) in frames.iter().enumerate() {
            let actions = fsm.on_event(frame(i as u8 + 1, data, true));
            assert_eq!(sent_byte(&actions), Some(ACK));
            if let Some(message) = dispatched(&actions) {
                dispatch_count += 1;
                assert_eq!(message.len(), 4);
                assert_eq!(message.sender_name(), Some("cobas"));
                assert_eq!(message.records()[0].record_type, RecordType::Header);
                assert_eq!(message.records()[3].record_type, RecordType::Terminator);
            }
        }
        assert_eq!(dispatch_count, 1);
        assert_eq!(fsm.phase(), Phase::Termination);

        let actions = fsm.on_event(SessionEvent::Control(EOT));
        assert!(matches!(actions[0], Action::CancelTimer(TimerKind::Receive)));
        assert_eq!(fsm.phase(), Phase::Idle);
    }

    #[test]
    fn test_frame_numbers_wrap_through_zero() {
        let mut fsm = fsm();
        establish(&mut fsm);

        // Ten records: frame numbers run 1..7, 0, 1, 2.
        let mut dispatch_count = 0;
        let mut number = FrameNumber::ZERO;
        for i in 0..10 {
            let data: Vec<u8> = match i {
                0 => b"H|\\^&|||analyzer\r".to_vec(),
                9 => b"L|1|N\r".to_vec(),
                n => format!("C|{}|note\r", n).into_bytes(),
            };
            number = number.next();
            let actions = fsm.on_event(frame(number.value(), &data, true));
            assert_eq!(sent_byte(&actions), Some(ACK), "frame {}", i);
            if let Some(message) = dispatched(&actions) {
                dispatch_count += 1;
                assert_eq!(message.len(), 10);
            }
        }
        assert_eq!(dispatch_count, 1);
    }

    #[test]
    fn test_bad_checksum_then_retransmit() {
        let mut fsm = fsm();
        establish(&mut fsm);

        let actions = fsm.on_event(corrupt());
        assert_eq!(sent_byte(&actions), Some(NAK));
        assert_eq!(fsm.expected_frame(), FrameNumber::new(1));

        let actions = fsm.on_event(frame(1, b"H|\\^&\r", true));
        assert_eq!(sent_byte(&actions), Some(ACK));
        assert_eq!(fsm.expected_frame(), FrameNumber::new(2));
    }

    #[test]
    fn test_duplicate_frame_acked_without_reappend() {
        let mut fsm = fsm();
        establish(&mut fsm);

        fsm.on_event(frame(1, b"H|\\^&|||cobas\r", true));
        fsm.on_event(frame(2, b"P|1\r", true));

        // Our ACK for frame 2 was lost; the peer sends it again.
        let actions = fsm.on_event(frame(2, b"P|1\r", true));
        assert_eq!(sent_byte(&actions), Some(ACK));
        assert!(dispatched(&actions).is_none());
        assert_eq!(fsm.expected_frame(), FrameNumber::new(3));

        let actions = fsm.on_event(frame(3, b"L|1|N\r", true));
        let message = dispatched(&actions).unwrap();
        assert_eq!(message.len(), 3);
    }

    #[test]
    fn test_etb_continuation_yields_one_record() {
        let mut fsm = fsm();
        establish(&mut fsm);

        fsm.on_event(frame(1, b"H|\\^&\r", true));
        let actions = fsm.on_event(frame(2, b"R|1|^^^GLU|veryl", false));
        assert_eq!(sent_byte(&actions), Some(ACK));
        fsm.on_event(frame(3, b"ongvalue|mmol/L\r", true));

        let actions = fsm.on_event(frame(4, b"L|1|N\r", true));
        let message = dispatched(&actions).unwrap();
        assert_eq!(message.len(), 3);
        assert_eq!(
            &message.records()[1].raw[..],
            b"R|1|^^^GLU|verylongvalue|mmol/L"
        );
    }

    #[test]
    fn test_eot_mid_message_discards() {
        let mut fsm = fsm();
        establish(&mut fsm);

        fsm.on_event(frame(1, b"H|\\^&\r", true));
        fsm.on_event(frame(2, b"P|1\r", true));

        let actions = fsm.on_event(SessionEvent::Control(EOT));
        assert!(dispatched(&actions).is_none());
        assert_eq!(fsm.phase(), Phase::Idle);

        // The line is free again.
        establish(&mut fsm);
        let actions = fsm.on_event(frame(1, b"H|\\^&\r", true));
        assert_eq!(sent_byte(&actions), Some(ACK));
    }

    #[test]
    fn test_receive_timeout_discards_without_close() {
        let mut fsm = fsm();
        establish(&mut fsm);
        fsm.on_event(frame(1, b"H|\\^&\r", true));

        let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Receive));
        assert!(dispatched(&actions).is_none());
        assert!(!actions.iter().any(|a| matches!(a, Action::Close)));
        assert_eq!(fsm.phase(), Phase::Idle);

        // The terminator of the abandoned message finds no open session.
        let actions = fsm.on_event(frame(2, b"L|1|N\r", true));
        assert_eq!(sent_byte(&actions), Some(NAK));
    }

    #[test]
    fn test_wrong_frame_number_naks() {
        let mut fsm = fsm();
        establish(&mut fsm);

        let actions = fsm.on_event(frame(5, b"H|\\^&\r", true));
        assert_eq!(sent_byte(&actions), Some(NAK));
        assert_eq!(fsm.expected_frame(), FrameNumber::new(1));
    }

    #[test]
    fn test_nak_limit_aborts_with_eot() {
        let mut fsm = fsm();
        establish(&mut fsm);

        for _ in 0..6 {
            let actions = fsm.on_event(corrupt());
            assert_eq!(sent_byte(&actions), Some(NAK));
        }
        let actions = fsm.on_event(corrupt());
        assert_eq!(sent_byte(&actions), Some(EOT));
        assert!(actions.iter().any(|a| matches!(a, Action::Close)));
        assert_eq!(fsm.phase(), Phase::Idle);
    }

    #[test]
    fn test_terminal_frame_without_cr_naks() {
        let mut fsm = fsm();
        establish(&mut fsm);

        let actions = fsm.on_event(frame(1, b"H|\\^&", true));
        assert_eq!(sent_byte(&actions), Some(NAK));
        assert_eq!(fsm.expected_frame(), FrameNumber::new(1));
    }

    #[test]
    fn test_record_outside_message_dropped() {
        let mut fsm = fsm();
        establish(&mut fsm);

        // Transport accepts the frame, assembly drops the orphan record.
        let actions = fsm.on_event(frame(1, b"P|1\r", true));
        assert_eq!(sent_byte(&actions), Some(ACK));
        let actions = fsm.on_event(frame(2, b"L|1|N\r", true));
        assert!(dispatched(&actions).is_none());
    }

    #[test]
    fn test_second_header_restarts_assembly() {
        let mut fsm = fsm();
        establish(&mut fsm);

        fsm.on_event(frame(1, b"H|\\^&|||first\r", true));
        fsm.on_event(frame(2, b"P|1\r", true));
        fsm.on_event(frame(3, b"H|\\^&|||second\r", true));
        let actions = fsm.on_event(frame(4, b"L|1|N\r", true));

        let message = dispatched(&actions).unwrap();
        assert_eq!(message.len(), 2);
        assert_eq!(message.sender_name(), Some("second"));
    }

    #[test]
    fn test_multiple_messages_per_session() {
        let mut fsm = fsm();
        establish(&mut fsm);

        let mut dispatch_count = 0;
        let frames: [&[u8]; 4] = [b"H|\\^&\r", b"L|1|N\r", b"H|\\^&\r", b"L|1|N\r"];
        for (i, data) in frames.iter().enumerate() {
            let actions = fsm.on_event(frame(i as u8 + 1, data, true));
            assert_eq!(sent_byte(&actions), Some(ACK));
            if dispatched(&actions).is_some() {
                dispatch_count += 1;
            }
        }
        assert_eq!(dispatch_count, 2);

        let _ = fsm.on_event(SessionEvent::Control(EOT));
        assert_eq!(fsm.phase(), Phase::Idle);
    }

    #[test]
    fn test_header_delimiters_applied() {
        let mut fsm = fsm();
        establish(&mut fsm);

        fsm.on_event(frame(1, b"H!/%#!!!custom\r", true));
        fsm.on_event(frame(2, b"R!1!a%b\r", true));
        let actions = fsm.on_event(frame(3, b"L!1!N\r", true));

        let message = dispatched(&actions).unwrap();
        let result = &message.records()[1];
        assert_eq!(result.field_str(1), Some("1"));
        match result.field(2).unwrap() {
            astmgate_core::Field::Components(parts) => {
                assert_eq!(parts[0].as_str(), Some("a"));
                assert_eq!(parts[1].as_str(), Some("b"));
            }
            other => panic!("expected components, got {:?}", other),
        }
    }

    #[test]
    fn test_peer_close_discards_and_closes() {
        let mut fsm = fsm();
        establish(&mut fsm);
        fsm.on_event(frame(1, b"H|\\^&\r", true));

        let actions = fsm.on_event(SessionEvent::PeerClosed);
        assert!(dispatched(&actions).is_none());
        assert!(actions.iter().any(|a| matches!(a, Action::Close)));
    }
}
