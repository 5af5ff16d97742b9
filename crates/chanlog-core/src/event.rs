// ABOUTME: Defines the session lifecycle events emitted toward the host and the journal.
// ABOUTME: Every event carries the canonical {source, requestor, id} payload; id is never omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::channel::ChannelId;
use crate::log_id::LogId;

/// Which session transition an event records. Serialized with the host's
/// event names (`logStart`, `logEnd`, `logPause`, `logResume`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEventKind {
    #[serde(rename = "logStart")]
    LogStart,
    #[serde(rename = "logEnd")]
    LogEnd,
    #[serde(rename = "logPause")]
    LogPause,
    #[serde(rename = "logResume")]
    LogResume,
}

impl LogEventKind {
    /// The event name as the host sees it.
    pub fn name(&self) -> &'static str {
        match self {
            LogEventKind::LogStart => "logStart",
            LogEventKind::LogEnd => "logEnd",
            LogEventKind::LogPause => "logPause",
            LogEventKind::LogResume => "logResume",
        }
    }
}

/// Payload shared by all four session events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEventPayload {
    pub source: ChannelId,
    pub requestor: String,
    pub id: LogId,
}

/// A session event envelope: a unique id and timestamp around the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event_id: Ulid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogEventKind,
    #[serde(flatten)]
    pub payload: SessionEventPayload,
}

impl LogEvent {
    /// Create a new event stamped with a fresh ULID and the current time.
    pub fn new(kind: LogEventKind, source: ChannelId, requestor: String, id: LogId) -> Self {
        Self {
            event_id: Ulid::new(),
            timestamp: Utc::now(),
            kind,
            payload: SessionEventPayload {
                source,
                requestor,
                id,
            },
        }
    }
}
