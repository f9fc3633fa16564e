/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Input and output alphabets of the transport state machines.
//!
//! A session runner translates socket reads into [`SessionEvent`]s, feeds
//! them to a state machine, and executes the returned [`Action`]s. The
//! state machines themselves perform no I/O.

use astmgate_codec::Frame;
use astmgate_core::{FrameError, Message};
use bytes::Bytes;
use std::time::Duration;

/// The E1381 protocol phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No transfer underway; the line is free.
    Idle,
    /// ENQ sent, awaiting the peer's answer (sender role).
    EstablishmentPending,
    /// Frames are moving.
    Transfer,
    /// Final terminator record seen; awaiting EOT.
    Termination,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::EstablishmentPending => "establishment-pending",
            Self::Transfer => "transfer",
            Self::Termination => "termination",
        };
        write!(f, "{}", name)
    }
}

/// Per-session timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// T1: awaiting a peer reply.
    Response,
    /// T2: idle gap while a message is in progress.
    Receive,
    /// T3: backoff before a retransmission slot.
    Retry,
}

/// Input alphabet of the state machines.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A single link control byte arrived (ENQ, ACK, NAK, EOT).
    Control(u8),
    /// A verified frame arrived.
    Frame(Frame),
    /// A malformed frame or junk bytes arrived.
    Corrupt(FrameError),
    /// A previously armed timer expired.
    Timer(TimerKind),
    /// The peer closed the connection.
    PeerClosed,
}

/// Output alphabet of the state machines.
#[derive(Debug, Clone)]
pub enum Action {
    /// Write these bytes to the peer.
    Send(Bytes),
    /// Hand a completed message to the dispatcher.
    Dispatch(Message),
    /// Arm (or rearm) a timer for the given window.
    ArmTimer(TimerKind, Duration),
    /// Cancel a timer if armed.
    CancelTimer(TimerKind),
    /// Tear the session down.
    Close,
}

/// Renders a single control byte as a wire write.
#[inline]
#[must_use]
pub(crate) fn send_control(byte: u8) -> Action {
    Action::Send(Bytes::copy_from_slice(&[byte]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use astmgate_core::ACK;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Transfer.to_string(), "transfer");
        assert_eq!(
            Phase::EstablishmentPending.to_string(),
            "establishment-pending"
        );
    }

    #[test]
    fn test_send_control() {
        match send_control(ACK) {
            Action::Send(bytes) => assert_eq!(&bytes[..], &[ACK]),
            other => panic!("expected send, got {:?}", other),
        }
    }
}
