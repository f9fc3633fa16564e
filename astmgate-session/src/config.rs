/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! Timer windows and retry limits for one transport session. Defaults
//! follow the ASTM recommendation.

use std::time::Duration;

/// Configuration for an ASTM transport session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// T1: response timer while awaiting a peer reply (establishment, or
    /// after sending a frame in the sender role).
    pub t1_response: Duration,
    /// T2: maximum idle gap between frames while a message is in progress.
    pub t2_receive: Duration,
    /// T3: backoff before a retransmission slot after a NAK.
    pub t3_retry: Duration,
    /// Consecutive NAK exchanges on one frame before the session aborts.
    pub max_consecutive_naks: u32,
    /// Establishment attempts before the sender gives up.
    pub max_enq_attempts: u32,
}

impl SessionConfig {
    /// Creates a configuration with the recommended defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            t1_response: Duration::from_secs(15),
            t2_receive: Duration::from_secs(30),
            t3_retry: Duration::from_secs(10),
            max_consecutive_naks: 6,
            max_enq_attempts: 6,
        }
    }

    /// Sets the T1 response window.
    #[must_use]
    pub const fn with_response_timer(mut self, window: Duration) -> Self {
        self.t1_response = window;
        self
    }

    /// Sets the T2 receive window.
    #[must_use]
    pub const fn with_receive_timer(mut self, window: Duration) -> Self {
        self.t2_receive = window;
        self
    }

    /// Sets the T3 retry backoff.
    #[must_use]
    pub const fn with_retry_backoff(mut self, window: Duration) -> Self {
        self.t3_retry = window;
        self
    }

    /// Sets the consecutive NAK abort threshold.
    #[must_use]
    pub const fn with_max_consecutive_naks(mut self, limit: u32) -> Self {
        self.max_consecutive_naks = limit;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
