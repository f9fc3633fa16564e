/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Gateway builder for fluent configuration.

use crate::listener::Gateway;
use astmgate_core::ConfigError;
use astmgate_dispatch::{Dispatcher, MessageSink};
use astmgate_session::SessionConfig;
use std::sync::Arc;
use std::time::Duration;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4010;

/// Builder for configuring a [`Gateway`].
#[derive(Debug)]
pub struct GatewayBuilder {
    listen: String,
    port: u16,
    session_config: SessionConfig,
    dispatcher: Dispatcher,
    shutdown_grace: Duration,
}

impl GatewayBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            port: DEFAULT_PORT,
            session_config: SessionConfig::new(),
            dispatcher: Dispatcher::new(),
            shutdown_grace: Duration::from_secs(10),
        }
    }

    /// Sets the listen IP address.
    #[must_use]
    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    /// Sets the listen port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the session configuration applied to every connection.
    #[must_use]
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Adds a message sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.dispatcher = self.dispatcher.with_sink(sink);
        self
    }

    /// Sets the shutdown grace period for draining sessions.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Returns the number of configured sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.dispatcher.len()
    }

    /// Builds the gateway.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidListenAddr` if the address does not
    /// parse.
    pub fn build(self) -> Result<Gateway, ConfigError> {
        let addr = format!("{}:{}", self.listen, self.port);
        let listen = addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(addr))?;

        Ok(Gateway {
            listen,
            session_config: self.session_config,
            dispatcher: Arc::new(self.dispatcher),
            shutdown_grace: self.shutdown_grace,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
