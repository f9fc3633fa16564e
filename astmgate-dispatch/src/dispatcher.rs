/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Fan-out of completed messages to the configured sinks.

use crate::traits::MessageSink;
use astmgate_core::Message;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

/// Delivers each message to every configured sink.
///
/// Sinks run concurrently and independently; a failure is logged and never
/// prevents delivery to the other sinks.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn MessageSink>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Adds a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the number of configured sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sinks are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Delivers one message to all sinks.
    pub async fn dispatch(&self, message: &Message) {
        info!(
            records = message.len(),
            sender = message.sender_name().unwrap_or("unknown"),
            "dispatching message"
        );
        let deliveries = self.sinks.iter().map(|sink| async move {
            if let Err(err) = sink.deliver(message).await {
                error!(sink = sink.name(), %err, "delivery failed");
            }
        });
        join_all(deliveries).await;
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
