/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session runner: one TCP peer, one receiver state machine.
//!
//! The runner owns all the await points of a session: socket reads and
//! writes, timer waits, and the per-session dispatch queue. The state
//! machine owns every protocol decision. Completed messages go through an
//! in-order queue drained by a dedicated task, so delivery (including HTTP
//! retries) never blocks the instrument and never reorders within a
//! session.

use astmgate_codec::WireEvent;
use astmgate_core::{Message, Result};
use astmgate_dispatch::Dispatcher;
use astmgate_session::{Action, ReceiverFsm, SessionConfig, SessionEvent, TimerKind};
use astmgate_transport::AstmWireCodec;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// The three per-session timers, armed and cancelled by FSM actions.
#[derive(Debug, Default)]
pub(crate) struct TimerSet {
    deadlines: [Option<Instant>; 3],
}

impl TimerSet {
    const KINDS: [TimerKind; 3] = [TimerKind::Response, TimerKind::Receive, TimerKind::Retry];

    const fn index(kind: TimerKind) -> usize {
        match kind {
            TimerKind::Response => 0,
            TimerKind::Receive => 1,
            TimerKind::Retry => 2,
        }
    }

    pub(crate) fn arm(&mut self, kind: TimerKind, window: Duration) {
        self.deadlines[Self::index(kind)] = Some(Instant::now() + window);
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        self.deadlines[Self::index(kind)] = None;
    }

    /// Waits for the earliest armed timer; pending forever when none is
    /// armed, which disables the select branch.
    pub(crate) async fn expired(&mut self) -> TimerKind {
        let earliest = self
            .deadlines
            .iter()
            .enumerate()
            .filter_map(|(i, deadline)| deadline.map(|d| (i, d)))
            .min_by_key(|&(_, deadline)| deadline);

        match earliest {
            Some((index, deadline)) => {
                sleep_until(deadline).await;
                self.deadlines[index] = None;
                Self::KINDS[index]
            }
            None => std::future::pending().await,
        }
    }
}

pub(crate) fn wire_to_event(event: WireEvent) -> SessionEvent {
    match event {
        WireEvent::Control(byte) => SessionEvent::Control(byte),
        WireEvent::Frame(frame) => SessionEvent::Frame(frame),
        WireEvent::Corrupt(err) => SessionEvent::Corrupt(err),
        // The transport codec never yields NeedMore as an item.
        WireEvent::NeedMore => SessionEvent::PeerClosed,
    }
}

/// Runs one receiver session over an accepted connection until the peer
/// disconnects or the state machine closes it.
///
/// # Arguments
/// * `stream` - The accepted instrument connection
/// * `config` - Session timer windows and retry limits
/// * `dispatcher` - Shared sink fan-out
///
/// # Errors
/// Returns an error only for genuine socket failures; protocol trouble is
/// handled on the wire.
pub async fn run_session(
    stream: TcpStream,
    config: SessionConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    let mut framed = tokio_util::codec::Framed::new(stream, AstmWireCodec::new());
    let mut fsm = ReceiverFsm::new(config);
    let mut timers = TimerSet::default();

    // In-order dispatch queue; dropped on session end, which lets the
    // drain task finish whatever is still queued.
    let (queue, mut pending) = mpsc::unbounded_channel::<Message>();
    let drain = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            while let Some(message) = pending.recv().await {
                dispatcher.dispatch(&message).await;
            }
        })
    };

    let result = loop {
        let event = tokio::select! {
            item = framed.next() => match item {
                Some(Ok(wire)) => wire_to_event(wire),
                Some(Err(err)) => break Err(err.into()),
                None => SessionEvent::PeerClosed,
            },
            kind = timers.expired() => SessionEvent::Timer(kind),
        };

        let peer_gone = matches!(event, SessionEvent::PeerClosed);
        let mut close = false;
        for action in fsm.on_event(event) {
            match action {
                Action::Send(bytes) => {
                    if !peer_gone {
                        framed.send(bytes).await?;
                    }
                }
                Action::Dispatch(message) => {
                    debug!(records = message.len(), "message queued for dispatch");
                    let _ = queue.send(message);
                }
                Action::ArmTimer(kind, window) => timers.arm(kind, window),
                Action::CancelTimer(kind) => timers.cancel(kind),
                Action::Close => close = true,
            }
        }
        if close || peer_gone {
            break Ok(());
        }
    };

    drop(queue);
    let _ = drain.await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use astmgate_codec::encode_frame;
    use astmgate_core::{ACK, ENQ, EOT, FrameNumber};
    use astmgate_dispatch::MessageSink;
    use astmgate_core::SinkError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct CaptureSink {
        texts: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl MessageSink for CaptureSink {
        fn name(&self) -> &str {
            "capture"
        }

        async fn deliver(&self, message: &Message) -> std::result::Result<(), SinkError> {
            self.texts.lock().unwrap().push(message.to_text());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_session_acks_and_dispatches() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sink = Arc::new(CaptureSink {
            texts: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(Dispatcher::new().with_sink(sink.clone()));

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            run_session(stream, SessionConfig::new(), dispatcher).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut reply = [0u8; 1];

        client.write_all(&[ENQ]).await.unwrap();
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], ACK);

        let records: [&[u8]; 3] = [b"H|\\^&|||cobas\r", b"P|1\r", b"L|1|N\r"];
        for (i, data) in records.iter().enumerate() {
            let frame = encode_frame(FrameNumber::new(i as u8 + 1), data, true);
            client.write_all(&frame).await.unwrap();
            client.read_exact(&mut reply).await.unwrap();
            assert_eq!(reply[0], ACK, "record {}", i);
        }

        client.write_all(&[EOT]).await.unwrap();
        drop(client);

        server.await.unwrap().unwrap();

        let texts = sink.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0], b"H|\\^&|||cobas\rP|1\rL|1|N\r");
    }
}
