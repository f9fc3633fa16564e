/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # AstmGate
//!
//! A middleware gateway between clinical analyzers and a Laboratory
//! Information System.
//!
//! AstmGate terminates the ASTM E1381 low-level transport on the instrument
//! side and forwards decoded ASTM E1394 (LIS2-A) messages downstream: to
//! append-only files, to an HTTP push endpoint, or both.
//!
//! ## Features
//!
//! - **Explicit protocol state machines**: every E1381 rule (frame numbers,
//!   checksums, NAK retries, line timers, contention) is testable without a
//!   socket
//! - **Incremental framing**: the codec consumes a byte stream as it
//!   arrives and answers corruption with NAK, never with a dropped
//!   connection
//! - **Independent sinks**: file dumps and LIS push retry and fail without
//!   blocking the instrument session
//! - **Async runtime**: built on Tokio, one lightweight task per session
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use astmgate::prelude::*;
//!
//! let gateway = GatewayBuilder::new()
//!     .with_port(4010)
//!     .with_sink(Arc::new(FileSink::new("/var/spool/astm")))
//!     .build()?;
//! gateway.run().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: fundamental types, traits, and error definitions
//! - [`codec`]: checksum and STX frame encoding/decoding
//! - [`records`]: E1394 record parsing into field trees
//! - [`session`]: the E1381 transport state machines
//! - [`transport`]: Tokio codec over TCP
//! - [`dispatch`]: message sinks and fan-out
//! - [`engine`]: listener, session runners, and the transmit driver

pub mod core {
    //! Fundamental types, traits, and error definitions.
    pub use astmgate_core::*;
}

pub mod codec {
    //! Checksum and STX frame encoding/decoding.
    pub use astmgate_codec::*;
}

pub mod records {
    //! E1394 record parsing into field trees.
    pub use astmgate_records::*;
}

pub mod session {
    //! The E1381 transport state machines.
    pub use astmgate_session::*;
}

pub mod transport {
    //! Tokio codec over TCP.
    pub use astmgate_transport::*;
}

pub mod dispatch {
    //! Message sinks and fan-out.
    pub use astmgate_dispatch::*;
}

pub mod engine {
    //! Listener, session runners, and the transmit driver.
    pub use astmgate_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use astmgate_core::{
        AstmTimestamp, ConfigError, Delimiters, Field, FrameError, FrameNumber, GatewayError,
        Message, Record, RecordType, Result, SessionError, SinkError,
    };

    // Frame codec
    pub use astmgate_codec::{Frame, WireEvent, decode_wire, encode_frame, frame_checksum};

    // Record parsing
    pub use astmgate_records::parse_record;

    // Session layer
    pub use astmgate_session::{
        Action, Phase, ReceiverFsm, SenderFsm, SessionConfig, SessionEvent, TimerKind,
    };

    // Transport
    pub use astmgate_transport::AstmWireCodec;

    // Dispatch
    pub use astmgate_dispatch::{Dispatcher, FileSink, HttpSink, MessageSink};

    // Engine
    pub use astmgate_engine::{
        Gateway, GatewayBuilder, read_message_records, resolve_target, run_session, transmit,
    };
}
