// ABOUTME: In-memory fakes for the session manager's collaborators and the host boundary.
// ABOUTME: Used in tests to drive sessions without SQLite, a filesystem, or a chat platform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::channel::{Channel, ChannelId, SequenceNumber};
use crate::host::{CommandContext, HostError};
use crate::log_id::LogId;
use crate::message::{ChannelUser, Notification, NotificationError};
use crate::store::{LogArtifacts, PersistenceError, SequenceStore, WriteError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A sequence store backed by a HashMap. Counts calls to `next`.
#[derive(Debug, Default)]
pub struct MemorySequenceStore {
    values: Mutex<HashMap<ChannelId, u64>>,
    next_calls: AtomicUsize,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store where `channel` has already been issued `last`.
    pub fn with_entry(channel: &str, last: u64) -> Self {
        let store = Self::new();
        lock(&store.values).insert(ChannelId::from(channel), last);
        store
    }

    pub fn value(&self, channel: &str) -> Option<u64> {
        lock(&self.values).get(&ChannelId::from(channel)).copied()
    }

    pub fn next_calls(&self) -> usize {
        self.next_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn next(&self, channel: &ChannelId) -> Result<SequenceNumber, PersistenceError> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        let mut values = lock(&self.values);
        let last = values.get(channel).copied().and_then(SequenceNumber::new);
        let next = SequenceNumber::after(last)
            .ok_or_else(|| PersistenceError::Exhausted(channel.clone()))?;
        values.insert(channel.clone(), next.get());
        Ok(next)
    }
}

/// A sequence store that can never issue a number.
#[derive(Debug, Default)]
pub struct FailingSequenceStore;

#[async_trait]
impl SequenceStore for FailingSequenceStore {
    async fn next(&self, _channel: &ChannelId) -> Result<SequenceNumber, PersistenceError> {
        Err(PersistenceError::backend(
            "write sequence",
            std::io::Error::other("disk full"),
        ))
    }
}

/// Log artifacts held in memory as lists of appended lines.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    files: Mutex<HashMap<String, Vec<String>>>,
    exists_checks: Mutex<Vec<String>>,
    append_calls: AtomicUsize,
    fail_appends: AtomicBool,
    fail_touches: AtomicBool,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty artifact, as if a previous session had written it.
    pub fn create(&self, log_id: &str) {
        lock(&self.files).entry(log_id.to_string()).or_default();
    }

    /// Lines appended to `log_id`, in order.
    pub fn lines(&self, log_id: &str) -> Vec<String> {
        lock(&self.files).get(log_id).cloned().unwrap_or_default()
    }

    /// Log ids passed to `artifact_exists`, in call order.
    pub fn exists_checks(&self) -> Vec<String> {
        lock(&self.exists_checks).clone()
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent appends fail (or succeed again).
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent artifact creation fail (or succeed again).
    pub fn fail_touches(&self, fail: bool) {
        self.fail_touches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LogArtifacts for MemoryArtifacts {
    async fn artifact_exists(&self, log_id: &LogId) -> bool {
        lock(&self.exists_checks).push(log_id.to_string());
        lock(&self.files).contains_key(log_id.as_str())
    }

    async fn touch(&self, log_id: &LogId) -> Result<(), WriteError> {
        if self.fail_touches.load(Ordering::SeqCst) {
            return Err(WriteError::new(
                log_id.clone(),
                std::io::Error::other("permission denied"),
            ));
        }
        lock(&self.files).entry(log_id.to_string()).or_default();
        Ok(())
    }

    async fn append(&self, log_id: &LogId, line: &str) -> Result<(), WriteError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(WriteError::new(
                log_id.clone(),
                std::io::Error::other("An error occurred!"),
            ));
        }
        lock(&self.files)
            .entry(log_id.to_string())
            .or_default()
            .push(line.to_string());
        Ok(())
    }
}

/// A notification that counts how often its text and sender are resolved.
#[derive(Debug)]
pub struct TestNotification {
    topic_id: String,
    username: Option<String>,
    text: String,
    date: DateTime<Utc>,
    resolve_calls: AtomicUsize,
}

impl TestNotification {
    pub fn new(topic_id: &str, username: &str, text: &str, date: DateTime<Utc>) -> Self {
        Self {
            topic_id: topic_id.to_string(),
            username: Some(username.to_string()),
            text: text.to_string(),
            date,
            resolve_calls: AtomicUsize::new(0),
        }
    }

    /// A notification whose sender cannot be resolved.
    pub fn without_user(topic_id: &str, text: &str, date: DateTime<Utc>) -> Self {
        Self {
            username: None,
            ..Self::new(topic_id, "", text, date)
        }
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notification for TestNotification {
    fn topic_id(&self) -> &str {
        &self.topic_id
    }

    async fn text(&self) -> Result<String, NotificationError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }

    async fn user(&self) -> Result<ChannelUser, NotificationError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.username
            .clone()
            .map(ChannelUser::new)
            .ok_or_else(|| NotificationError::User("sender unknown".to_string()))
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

/// A command context that records every reply it is given.
#[derive(Debug)]
pub struct RecordingContext {
    channel: Channel,
    requestor: String,
    args: Vec<String>,
    replies: Mutex<Vec<String>>,
}

impl RecordingContext {
    pub fn new(channel_id: &str, requestor: &str) -> Self {
        Self {
            channel: Channel::new(channel_id, channel_id),
            requestor: requestor.to_string(),
            args: Vec::new(),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.channel.title = title.to_string();
        self
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn replies(&self) -> Vec<String> {
        lock(&self.replies).clone()
    }
}

#[async_trait]
impl CommandContext for RecordingContext {
    async fn channel(&self) -> Result<Channel, HostError> {
        Ok(self.channel.clone())
    }

    fn requestor(&self) -> &str {
        &self.requestor
    }

    async fn reply(&self, text: &str) -> Result<(), HostError> {
        lock(&self.replies).push(text.to_string());
        Ok(())
    }

    fn args(&self) -> &[String] {
        &self.args
    }
}
