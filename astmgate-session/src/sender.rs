/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sender role of the transport state machine.
//!
//! The mirror of the receiver: establishes the line with ENQ, transmits a
//! message frame by frame awaiting ACK, backs off on NAK, and finishes with
//! EOT. Contention (an ENQ answering our ENQ) is always resolved by
//! yielding; the instrument wins the line.

use crate::config::SessionConfig;
use crate::fsm::{Action, Phase, SessionEvent, TimerKind, send_control};
use astmgate_codec::split_record;
use astmgate_core::{ACK, ENQ, EOT, FrameNumber, NAK, SessionError};
use bytes::Bytes;
use tracing::{debug, warn};

/// The sender-side E1381 state machine for one message.
#[derive(Debug)]
pub struct SenderFsm {
    config: SessionConfig,
    phase: Phase,
    /// Pre-encoded frames of the whole message, in transmit order.
    frames: Vec<Bytes>,
    next_index: usize,
    consecutive_naks: u32,
    enq_attempts: u32,
    finished: bool,
    succeeded: bool,
    error: Option<SessionError>,
}

impl SenderFsm {
    /// Creates a sender for one message.
    ///
    /// Records are encoded up front: the frame counter starts at 1 and runs
    /// across record boundaries, with oversized records split into ETB
    /// continuations.
    ///
    /// # Arguments
    /// * `config` - Session timer windows and retry limits
    /// * `records` - The record lines of the message, CR excluded
    #[must_use]
    pub fn new(config: SessionConfig, records: &[Vec<u8>]) -> Self {
        let mut counter = FrameNumber::ZERO;
        let frames = records
            .iter()
            .flat_map(|record| split_record(&mut counter, record))
            .collect();

        Self {
            config,
            phase: Phase::Idle,
            frames,
            next_index: 0,
            consecutive_naks: 0,
            enq_attempts: 0,
            finished: false,
            succeeded: false,
            error: None,
        }
    }

    /// Returns the current protocol phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true once the session has reached its terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true if every frame was acknowledged and EOT sent.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Returns the reason a failed session ended, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Returns the number of frames this message encodes to.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Opens the line: sends ENQ and starts the response timer.
    pub fn start(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.phase = Phase::EstablishmentPending;
        self.try_enq(&mut actions);
        actions
    }

    /// Feeds one event into the state machine and returns the actions the
    /// runner must execute, in order.
    pub fn on_event(&mut self, event: SessionEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.phase {
            Phase::Idle | Phase::Termination => {
                if matches!(event, SessionEvent::PeerClosed) {
                    actions.push(Action::Close);
                }
            }
            Phase::EstablishmentPending => self.on_establishment_event(event, &mut actions),
            Phase::Transfer => self.on_transfer_event(event, &mut actions),
        }
        actions
    }

    fn on_establishment_event(&mut self, event: SessionEvent, actions: &mut Vec<Action>) {
        match event {
            SessionEvent::Control(ACK) => {
                debug!("line established");
                actions.push(Action::CancelTimer(TimerKind::Response));
                self.phase = Phase::Transfer;
                self.consecutive_naks = 0;
                self.send_current(actions);
            }
            SessionEvent::Control(NAK) => {
                debug!("establishment refused; backing off");
                actions.push(Action::CancelTimer(TimerKind::Response));
                actions.push(Action::ArmTimer(TimerKind::Retry, self.config.t3_retry));
            }
            SessionEvent::Control(ENQ) => {
                // Contention: the instrument wants the line. Always yield.
                debug!("enq contention; yielding");
                actions.push(Action::CancelTimer(TimerKind::Response));
                actions.push(Action::ArmTimer(TimerKind::Retry, self.config.t3_retry));
            }
            SessionEvent::Control(_) => {}
            SessionEvent::Timer(TimerKind::Response | TimerKind::Retry) => {
                self.try_enq(actions);
            }
            SessionEvent::Timer(_) => {}
            SessionEvent::Frame(_) | SessionEvent::Corrupt(_) => {
                debug!("unexpected frame while establishing");
            }
            SessionEvent::PeerClosed => {
                self.fail_with(SessionError::PeerDisconnected, actions);
            }
        }
    }

    fn on_transfer_event(&mut self, event: SessionEvent, actions: &mut Vec<Action>) {
        match event {
            SessionEvent::Control(ACK) => {
                self.consecutive_naks = 0;
                self.next_index += 1;
                if self.next_index >= self.frames.len() {
                    debug!("all frames acknowledged");
                    actions.push(Action::CancelTimer(TimerKind::Response));
                    actions.push(send_control(EOT));
                    self.phase = Phase::Idle;
                    self.finished = true;
                    self.succeeded = true;
                    actions.push(Action::Close);
                } else {
                    self.send_current(actions);
                }
            }
            SessionEvent::Control(NAK) => self.on_rejection(actions),
            SessionEvent::Timer(TimerKind::Response) => {
                warn!("no reply to frame; treating as rejection");
                self.on_rejection(actions);
            }
            SessionEvent::Timer(TimerKind::Retry) => {
                debug!(index = self.next_index, "retransmitting frame");
                self.send_current(actions);
            }
            SessionEvent::Timer(_) => {}
            SessionEvent::Control(EOT) => {
                warn!("peer aborted the transfer");
                self.fail_with(SessionError::PeerDisconnected, actions);
            }
            SessionEvent::Control(_) => {}
            SessionEvent::Frame(_) | SessionEvent::Corrupt(_) => {
                debug!("unexpected frame during transmit");
            }
            SessionEvent::PeerClosed => {
                self.fail_with(SessionError::PeerDisconnected, actions);
            }
        }
    }

    fn send_current(&mut self, actions: &mut Vec<Action>) {
        if let Some(frame) = self.frames.get(self.next_index) {
            actions.push(Action::Send(frame.clone()));
            actions.push(Action::ArmTimer(
                TimerKind::Response,
                self.config.t1_response,
            ));
        } else {
            // Empty message: nothing to transfer.
            actions.push(send_control(EOT));
            self.phase = Phase::Idle;
            self.finished = true;
            self.succeeded = true;
            actions.push(Action::Close);
        }
    }

    fn on_rejection(&mut self, actions: &mut Vec<Action>) {
        self.consecutive_naks += 1;
        if self.consecutive_naks >= self.config.max_consecutive_naks {
            warn!(
                count = self.consecutive_naks,
                "frame rejected too many times; aborting"
            );
            actions.push(Action::CancelTimer(TimerKind::Response));
            actions.push(send_control(EOT));
            self.fail_with(
                SessionError::NakLimitExceeded {
                    count: self.consecutive_naks,
                },
                actions,
            );
        } else {
            actions.push(Action::CancelTimer(TimerKind::Response));
            actions.push(Action::ArmTimer(TimerKind::Retry, self.config.t3_retry));
        }
    }

    fn try_enq(&mut self, actions: &mut Vec<Action>) {
        self.enq_attempts += 1;
        if self.enq_attempts > self.config.max_enq_attempts {
            warn!(
                attempts = self.enq_attempts - 1,
                "establishment failed; giving up"
            );
            self.fail_with(
                SessionError::EstablishmentFailed {
                    attempts: self.enq_attempts - 1,
                },
                actions,
            );
        } else {
            actions.push(send_control(ENQ));
            actions.push(Action::ArmTimer(
                TimerKind::Response,
                self.config.t1_response,
            ));
        }
    }

    fn fail_with(&mut self, error: SessionError, actions: &mut Vec<Action>) {
        self.phase = Phase::Idle;
        self.finished = true;
        self.succeeded = false;
        self.error = Some(error);
        actions.push(Action::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astmgate_core::STX;

    fn records() -> Vec<Vec<u8>> {
        vec![b"H|\\^&|||gateway".to_vec(), b"L|1|N".to_vec()]
    }

    fn sender() -> SenderFsm {
        SenderFsm::new(SessionConfig::new(), &records())
    }

    fn sent_frame(actions: &[Action]) -> Option<&Bytes> {
        actions.iter().find_map(|a| match a {
            Action::Send(bytes) if bytes.len() > 1 => Some(bytes),
            _ => None,
        })
    }

    fn sent_byte(actions: &[Action]) -> Option<u8> {
        actions.iter().find_map(|a| match a {
            Action::Send(bytes) if bytes.len() == 1 => Some(bytes[0]),
            _ => None,
        })
    }

    fn closes(actions: &[Action]) -> bool {
        actions.iter().any(|a| matches!(a, Action::Close))
    }

    #[test]
    fn test_start_sends_enq() {
        let mut fsm = sender();
        assert_eq!(fsm.frame_count(), 2);

        let actions = fsm.start();
        assert_eq!(sent_byte(&actions), Some(ENQ));
        assert_eq!(fsm.phase(), Phase::EstablishmentPending);
    }

    #[test]
    fn test_clean_transmission() {
        let mut fsm = sender();
        fsm.start();

        let actions = fsm.on_event(SessionEvent::Control(ACK));
        let frame = sent_frame(&actions).unwrap();
        assert_eq!(frame[0], STX);
        assert_eq!(frame[1], b'1');
        assert_eq!(fsm.phase(), Phase::Transfer);

        let actions = fsm.on_event(SessionEvent::Control(ACK));
        assert_eq!(sent_frame(&actions).unwrap()[1], b'2');

        let actions = fsm.on_event(SessionEvent::Control(ACK));
        assert_eq!(sent_byte(&actions), Some(EOT));
        assert!(closes(&actions));
        assert!(fsm.is_finished());
        assert!(fsm.succeeded());
    }

    #[test]
    fn test_nak_backs_off_then_retransmits() {
        let mut fsm = sender();
        fsm.start();
        let actions = fsm.on_event(SessionEvent::Control(ACK));
        let first = sent_frame(&actions).unwrap().clone();

        let actions = fsm.on_event(SessionEvent::Control(NAK));
        assert!(sent_frame(&actions).is_none());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ArmTimer(TimerKind::Retry, _))));

        let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Retry));
        assert_eq!(sent_frame(&actions), Some(&first));
    }

    #[test]
    fn test_nak_storm_aborts_with_eot() {
        let mut fsm = sender();
        fsm.start();
        fsm.on_event(SessionEvent::Control(ACK));

        for _ in 0..5 {
            let actions = fsm.on_event(SessionEvent::Control(NAK));
            assert!(!closes(&actions));
            fsm.on_event(SessionEvent::Timer(TimerKind::Retry));
        }
        let actions = fsm.on_event(SessionEvent::Control(NAK));
        assert_eq!(sent_byte(&actions), Some(EOT));
        assert!(closes(&actions));
        assert!(fsm.is_finished());
        assert!(!fsm.succeeded());
    }

    #[test]
    fn test_response_timeout_counts_as_rejection() {
        let mut fsm = sender();
        fsm.start();
        let actions = fsm.on_event(SessionEvent::Control(ACK));
        let first = sent_frame(&actions).unwrap().clone();

        let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Response));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ArmTimer(TimerKind::Retry, _))));

        let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Retry));
        assert_eq!(sent_frame(&actions), Some(&first));
    }

    #[test]
    fn test_contention_yields() {
        let mut fsm = sender();
        fsm.start();

        let actions = fsm.on_event(SessionEvent::Control(ENQ));
        assert!(sent_byte(&actions).is_none());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ArmTimer(TimerKind::Retry, _))));

        let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Retry));
        assert_eq!(sent_byte(&actions), Some(ENQ));
    }

    #[test]
    fn test_establishment_gives_up() {
        let mut fsm = sender();
        fsm.start();

        for _ in 0..5 {
            let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Response));
            assert_eq!(sent_byte(&actions), Some(ENQ));
        }
        let actions = fsm.on_event(SessionEvent::Timer(TimerKind::Response));
        assert!(closes(&actions));
        assert!(!fsm.succeeded());
    }

    #[test]
    fn test_peer_eot_aborts() {
        let mut fsm = sender();
        fsm.start();
        fsm.on_event(SessionEvent::Control(ACK));

        let actions = fsm.on_event(SessionEvent::Control(EOT));
        assert!(closes(&actions));
        assert!(!fsm.succeeded());
    }

    #[test]
    fn test_failure_reason_is_recorded() {
        let mut fsm = sender();
        fsm.start();
        fsm.on_event(SessionEvent::Control(ACK));

        for _ in 0..5 {
            fsm.on_event(SessionEvent::Control(NAK));
            fsm.on_event(SessionEvent::Timer(TimerKind::Retry));
        }
        fsm.on_event(SessionEvent::Control(NAK));
        assert!(matches!(
            fsm.error(),
            Some(SessionError::NakLimitExceeded { count: 6 })
        ));
    }

    #[test]
    fn test_long_record_splits_into_continuations() {
        let long = vec![b'z'; 500];
        let fsm = SenderFsm::new(SessionConfig::new(), &[long]);
        assert_eq!(fsm.frame_count(), 3);
    }
}
