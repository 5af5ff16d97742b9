// ABOUTME: In-memory table of channels currently being logged.
// ABOUTME: Absence of an entry means the channel is idle; sessions are never persisted.

use std::collections::HashMap;

use crate::channel::{ChannelId, SequenceNumber};
use crate::log_id::LogId;

/// Run-time status of a session. Paused and ended channels have no entry at
/// all, so Active is the only stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
}

/// A channel that is currently being logged and the artifact it writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub channel_id: ChannelId,
    pub sequence: SequenceNumber,
    pub log_id: LogId,
    pub status: SessionStatus,
}

impl Session {
    /// An active session writing to the artifact for `(channel_id, sequence)`.
    pub fn active(channel_id: ChannelId, sequence: SequenceNumber) -> Self {
        let log_id = LogId::format(&channel_id, sequence);
        Self {
            channel_id,
            sequence,
            log_id,
            status: SessionStatus::Active,
        }
    }
}

/// Authoritative run-time state of which channels are being logged.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<ChannelId, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<&Session> {
        self.sessions.get(channel_id)
    }

    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.sessions.contains_key(channel_id)
    }

    /// Log id of the active session for `channel_id`, if any.
    pub fn log_id(&self, channel_id: &ChannelId) -> Option<&LogId> {
        self.sessions.get(channel_id).map(|s| &s.log_id)
    }

    /// Install `session`, replacing any previous entry for the same channel.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.channel_id.clone(), session)
    }

    pub fn remove(&mut self, channel_id: &ChannelId) -> Option<Session> {
        self.sessions.remove(channel_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// All active sessions ordered by channel id.
    pub fn sessions(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self.sessions.values().cloned().collect();
        all.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        all
    }
}
