/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message sink trait definition.
//!
//! This module defines the abstract interface for message delivery targets.

use astmgate_core::{Message, SinkError};
use async_trait::async_trait;

/// Abstract interface for delivering a completed ASTM message.
///
/// Implementations must be safe to share across sessions; delivery for one
/// message must not depend on any other message.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &str;

    /// Delivers one message.
    ///
    /// # Arguments
    /// * `message` - The completed header-to-terminator message
    ///
    /// # Errors
    /// Returns `SinkError` if delivery definitively failed; the dispatcher
    /// logs and continues.
    async fn deliver(&self, message: &Message) -> Result<(), SinkError>;
}
