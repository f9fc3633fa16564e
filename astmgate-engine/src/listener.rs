/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! TCP listener: accepts instrument connections and runs one session per
//! peer.
//!
//! Shutdown (SIGINT/SIGTERM, or any caller-provided future) stops accepting
//! and drains live sessions for a bounded grace period before aborting
//! what remains.

use crate::runner::run_session;
use astmgate_dispatch::Dispatcher;
use astmgate_session::SessionConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// A configured gateway, ready to serve.
///
/// Built by [`crate::GatewayBuilder`].
#[derive(Debug)]
pub struct Gateway {
    pub(crate) listen: SocketAddr,
    pub(crate) session_config: SessionConfig,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) shutdown_grace: Duration,
}

impl Gateway {
    /// Returns the configured listen address.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        self.listen
    }

    /// Serves until SIGINT or SIGTERM.
    ///
    /// # Errors
    /// Returns an error if the listen socket cannot be bound.
    pub async fn run(&self) -> astmgate_core::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves.
    ///
    /// # Errors
    /// Returns an error if the listen socket cannot be bound.
    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> astmgate_core::Result<()> {
        let listener = TcpListener::bind(self.listen).await.map_err(|err| {
            error!(addr = %self.listen, %err, "failed to bind");
            err
        })?;
        info!(addr = %self.listen, "gateway listening");

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "instrument connected");
                        let config = self.session_config.clone();
                        let dispatcher = Arc::clone(&self.dispatcher);
                        sessions.spawn(async move {
                            match run_session(stream, config, dispatcher).await {
                                Ok(()) => info!(%peer, "session closed"),
                                Err(err) => warn!(%peer, %err, "session failed"),
                            }
                        });
                    }
                    Err(err) => warn!(%err, "accept failed"),
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                () = &mut shutdown => break,
            }
        }

        info!(
            live = sessions.len(),
            "shutting down; draining sessions"
        );
        let drain = async {
            while sessions.join_next().await.is_some() {}
        };
        if timeout(self.shutdown_grace, drain).await.is_err() {
            warn!("grace period elapsed; aborting remaining sessions");
            sessions.abort_all();
        }
        info!("gateway stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                warn!(%err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
