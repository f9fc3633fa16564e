/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate Session
//!
//! The ASTM E1381 transport state machine.
//!
//! Both protocol roles are implemented as explicit, I/O-free state machines
//! over a small input alphabet (wire events, timer expiries, peer close) and
//! output alphabet (send bytes, arm/cancel timers, dispatch a message,
//! close). The surrounding runtime is a thin adaptor; every protocol rule is
//! unit-testable without a socket.
//!
//! - [`ReceiverFsm`]: the gateway side facing an instrument; acknowledges
//!   frames, assembles header-to-terminator messages, and emits them for
//!   dispatch
//! - [`SenderFsm`]: the protocol-symmetric transmit role used by the
//!   companion send tool
//!
//! Timer windows follow the ASTM recommendation (T1 response 15 s, T2
//! receive 30 s, T3 retry backoff 10 s) and are configurable through
//! [`SessionConfig`].

pub mod config;
pub mod fsm;
pub mod receiver;
pub mod sender;

pub use config::SessionConfig;
pub use fsm::{Action, Phase, SessionEvent, TimerKind};
pub use receiver::ReceiverFsm;
pub use sender::SenderFsm;
