/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Transmit driver: sends one plain-text ASTM message to a peer gateway.
//!
//! The companion of the receiver runner, driving a [`SenderFsm`] over a
//! client connection. Used by the `astm-send` tool.

use crate::builder::DEFAULT_PORT;
use crate::runner::{TimerSet, wire_to_event};
use astmgate_core::{ConfigError, Result, SessionError};
use astmgate_session::{Action, SenderFsm, SessionConfig, SessionEvent};
use astmgate_transport::AstmWireCodec;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Splits a plain-text ASTM message into its record lines.
///
/// Records are separated by CR, LF, or CR LF; empty lines are skipped.
#[must_use]
pub fn read_message_records(text: &[u8]) -> Vec<Vec<u8>> {
    text.split(|&b| b == b'\r' || b == b'\n')
        .filter(|line| !line.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Extracts `host:port` from a URL-shaped target.
///
/// Accepts a bare `host`, `host:port`, or `scheme://host:port/path`; the
/// port defaults to the gateway's listen port.
///
/// # Errors
/// Returns `ConfigError::InvalidUrl` if no host remains after stripping.
pub fn resolve_target(url: &str) -> std::result::Result<String, ConfigError> {
    let without_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let authority = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim();
    if authority.is_empty() {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }

    if authority.contains(':') {
        Ok(authority.to_string())
    } else {
        Ok(format!("{}:{}", authority, DEFAULT_PORT))
    }
}

/// Transmits one message to `addr` using the sender role.
///
/// # Arguments
/// * `addr` - `host:port` of the receiving gateway or LIS bridge
/// * `records` - The record lines of the message, CR excluded
/// * `config` - Session timer windows and retry limits
///
/// # Errors
/// Returns the session error that ended an unsuccessful transmission, or
/// an I/O error from the socket.
pub async fn transmit(addr: &str, records: &[Vec<u8>], config: SessionConfig) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    info!(%addr, frames = records.len(), "connected");

    let mut framed = tokio_util::codec::Framed::new(stream, AstmWireCodec::new());
    let mut fsm = SenderFsm::new(config, records);
    let mut timers = TimerSet::default();

    let mut pending = fsm.start();
    loop {
        let mut close = false;
        for action in pending.drain(..) {
            match action {
                Action::Send(bytes) => framed.send(bytes).await?,
                Action::ArmTimer(kind, window) => timers.arm(kind, window),
                Action::CancelTimer(kind) => timers.cancel(kind),
                Action::Close => close = true,
                // The sender role never dispatches.
                Action::Dispatch(_) => {}
            }
        }
        if close {
            break;
        }

        let event = tokio::select! {
            item = framed.next() => match item {
                Some(Ok(wire)) => wire_to_event(wire),
                Some(Err(err)) => return Err(err.into()),
                None => SessionEvent::PeerClosed,
            },
            kind = timers.expired() => SessionEvent::Timer(kind),
        };
        pending = fsm.on_event(event);
    }

    if fsm.succeeded() {
        debug!("transmission complete");
        Ok(())
    } else {
        let reason = fsm
            .error()
            .cloned()
            .unwrap_or(SessionError::PeerDisconnected);
        Err(reason.into())
    }
}
