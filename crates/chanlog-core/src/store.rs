// ABOUTME: Traits for the two durable collaborators of the session manager.
// ABOUTME: SequenceStore issues per-channel numbers; LogArtifacts checks for and appends to log files.

use std::error::Error as StdError;

use async_trait::async_trait;
use thiserror::Error;

use crate::channel::{ChannelId, SequenceNumber};
use crate::log_id::LogId;

/// Failure reading or writing the durable sequence store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backing store failed.
    #[error("sequence store failed: {context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A stored value is not a positive integer.
    #[error("stored sequence for channel {channel} is not a positive integer: {value:?}")]
    Corrupt { channel: ChannelId, value: String },

    /// The channel has used up every sequence number.
    #[error("sequence numbers exhausted for channel {0}")]
    Exhausted(ChannelId),
}

impl PersistenceError {
    #[must_use]
    pub fn backend(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Failure appending a line to a log artifact.
#[derive(Debug, Error)]
#[error("failed to append to log {log_id}: {source}")]
pub struct WriteError {
    pub log_id: LogId,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub fn new(log_id: LogId, source: std::io::Error) -> Self {
        Self { log_id, source }
    }
}

/// Durable map from channel id to the last issued sequence number.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Issue the next number for `channel`: last stored value (absent means 0)
    /// plus one, persisted before it is returned.
    async fn next(&self, channel: &ChannelId) -> Result<SequenceNumber, PersistenceError>;
}

/// Append-only log artifacts addressed by log id.
#[async_trait]
pub trait LogArtifacts: Send + Sync {
    /// Whether an artifact already exists for `log_id`. Resume is only
    /// allowed onto an existing artifact.
    async fn artifact_exists(&self, log_id: &LogId) -> bool;

    /// Create the artifact for `log_id` if it does not exist yet. Existing
    /// content is left untouched.
    async fn touch(&self, log_id: &LogId) -> Result<(), WriteError>;

    /// Append `line` (already newline-terminated) to the artifact, creating it
    /// if needed.
    async fn append(&self, log_id: &LogId, line: &str) -> Result<(), WriteError>;
}
