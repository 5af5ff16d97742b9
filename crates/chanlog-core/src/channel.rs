// ABOUTME: Identity types for channels and their per-channel log sequence numbers.
// ABOUTME: ChannelId keys every session lookup; SequenceNumber is the durable positive counter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a communication channel. May contain characters that
/// are unsafe in file names; see [`crate::LogId`] for the sanitized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A channel as reported by the host: its stable id plus a cosmetic title.
/// Only the id participates in session bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub title: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: ChannelId::new(id),
            title: title.into(),
        }
    }
}

/// A positive, per-channel log sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The number issued to a channel that has never been logged before.
    pub const FIRST: SequenceNumber = SequenceNumber(1);

    /// Returns None for zero, which is never a valid issued number.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Parse a decimal sequence number, rejecting zero, signs, and garbage.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        trimmed.parse::<u64>().ok().and_then(Self::new)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The number following this one, or None on overflow.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// The number issued after `last`, where None means nothing was issued yet.
    pub fn after(last: Option<SequenceNumber>) -> Option<Self> {
        match last {
            Some(last) => last.next(),
            None => Some(Self::FIRST),
        }
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_rejects_zero() {
        assert!(SequenceNumber::new(0).is_none());
        assert_eq!(SequenceNumber::new(7).unwrap().get(), 7);
    }

    #[test]
    fn sequence_number_parse() {
        assert_eq!(SequenceNumber::parse("123").unwrap().get(), 123);
        assert_eq!(SequenceNumber::parse(" 24 ").unwrap().get(), 24);
        assert!(SequenceNumber::parse("0").is_none());
        assert!(SequenceNumber::parse("-3").is_none());
        assert!(SequenceNumber::parse("+3").is_none());
        assert!(SequenceNumber::parse("twelve").is_none());
        assert!(SequenceNumber::parse("").is_none());
    }

    #[test]
    fn sequence_number_after() {
        assert_eq!(SequenceNumber::after(None), Some(SequenceNumber::FIRST));
        let last = SequenceNumber::new(32).unwrap();
        assert_eq!(SequenceNumber::after(Some(last)).unwrap().get(), 33);
        let max = SequenceNumber::new(u64::MAX).unwrap();
        assert!(SequenceNumber::after(Some(max)).is_none());
    }

    #[test]
    fn channel_id_displays_raw_value() {
        let id = ChannelId::from("#crossings_ooc");
        assert_eq!(id.to_string(), "#crossings_ooc");
        assert_eq!(id.as_str(), "#crossings_ooc");
    }
}
