/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! File sink: append-only message dumps.
//!
//! Each message becomes one file named `<unix_millis>-<counter>.txt` under
//! the configured directory, holding the raw records joined by CR with all
//! transport framing removed. Writes go to a hidden temporary sibling first
//! and are renamed into place, so readers never observe a partial file.

use crate::traits::MessageSink;
use astmgate_core::{Message, SinkError};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Writes one file per message under a directory.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileSink {
    /// Creates a file sink writing into `dir`.
    ///
    /// The directory must already exist; configuration validation happens
    /// at startup, not per message.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn next_filename(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}.txt", millis, seq)
    }
}

#[async_trait]
impl MessageSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, message: &Message) -> Result<(), SinkError> {
        let filename = self.next_filename();
        let final_path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!(".{}.tmp", filename));

        tokio::fs::write(&tmp_path, message.to_text())
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;

        debug!(path = %final_path.display(), records = message.len(), "message written");
        Ok(())
    }
}
