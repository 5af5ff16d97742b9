// ABOUTME: Inbound channel notifications and the single-line rendering written to log artifacts.
// ABOUTME: Lines look like `[HH:MM] <username> text` with a UTC, zero-padded timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors a host can report while resolving a notification's text or sender.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("could not fetch message text: {0}")]
    Text(String),

    #[error("could not fetch message sender: {0}")]
    User(String),
}

/// The sender of a channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    pub username: String,
}

impl ChannelUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// A message notification delivered by the host for some channel.
///
/// Text and sender are resolved lazily, so notifications for channels that
/// are not being logged never pay for the lookup.
#[async_trait]
pub trait Notification: Send + Sync {
    /// Id of the channel the message was posted in.
    fn topic_id(&self) -> &str;

    async fn text(&self) -> Result<String, NotificationError>;

    async fn user(&self) -> Result<ChannelUser, NotificationError>;

    fn date(&self) -> DateTime<Utc>;
}

/// A fully-resolved notification, for hosts that already hold the message.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub topic_id: String,
    pub username: String,
    pub text: String,
    pub date: DateTime<Utc>,
}

impl ChannelMessage {
    pub fn new(
        topic_id: impl Into<String>,
        username: impl Into<String>,
        text: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            topic_id: topic_id.into(),
            username: username.into(),
            text: text.into(),
            date,
        }
    }
}

#[async_trait]
impl Notification for ChannelMessage {
    fn topic_id(&self) -> &str {
        &self.topic_id
    }

    async fn text(&self) -> Result<String, NotificationError> {
        Ok(self.text.clone())
    }

    async fn user(&self) -> Result<ChannelUser, NotificationError> {
        Ok(ChannelUser::new(self.username.clone()))
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

/// Render one log record, newline-terminated. Embedded line breaks are
/// flattened so every message occupies exactly one line.
pub fn render_line(date: DateTime<Utc>, username: &str, text: &str) -> String {
    let flat = text
        .split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{}] <{}> {}\n", date.format("%H:%M"), username, flat)
}
