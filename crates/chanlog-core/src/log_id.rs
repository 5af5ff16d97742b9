// ABOUTME: Derives filesystem-safe log identifiers from a channel id and a sequence number.
// ABOUTME: The same LogId resolves to the same artifact for both resume checks and appends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, SequenceNumber};

/// Leading marker some chat platforms put on channel names.
const CHANNEL_MARKER: char = '#';

/// Characters that are replaced with `_` when building a log id.
const UNSAFE_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>', '.'];

/// Identifier of one logging session's artifact: the sanitized channel id
/// followed directly by the decimal sequence number.
///
/// Distinct channel ids can sanitize to the same prefix (`a/b` and `a:b`
/// both become `a_b`), so their artifacts may collide. That is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(String);

impl LogId {
    /// Build the log id for `channel_id` at `sequence`. Pure and deterministic.
    pub fn format(channel_id: &ChannelId, sequence: SequenceNumber) -> Self {
        let raw = channel_id.as_str();
        let stripped = raw.strip_prefix(CHANNEL_MARKER).unwrap_or(raw);

        let mut id: String = stripped
            .chars()
            .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
            .collect();
        id.push_str(&sequence.to_string());
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the artifact backing this log id.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, ARTIFACT_EXTENSION)
    }
}

/// Extension of every log artifact.
pub const ARTIFACT_EXTENSION: &str = "txt";

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n).unwrap()
    }

    #[test]
    fn strips_leading_marker() {
        let id = LogId::format(&ChannelId::from("#crossings_ooc"), seq(24));
        assert_eq!(id.as_str(), "crossings_ooc24");
    }

    #[test]
    fn replaces_unsafe_characters() {
        let id = LogId::format(&ChannelId::from("#$0m3r00/\\/\\_%0_:|"), seq(1));
        assert_eq!(id.as_str(), "$0m3r00______0___1");
    }

    #[test]
    fn only_one_leading_marker_is_removed() {
        let id = LogId::format(&ChannelId::from("##room"), seq(3));
        assert_eq!(id.as_str(), "#room3");
    }

    #[test]
    fn marker_in_the_middle_is_kept() {
        let id = LogId::format(&ChannelId::from("room#2"), seq(1));
        assert_eq!(id.as_str(), "room#21");
    }

    #[test]
    fn dots_quotes_and_brackets_are_replaced() {
        let id = LogId::format(&ChannelId::from("a.b\"c<d>e*f?"), seq(9));
        assert_eq!(id.as_str(), "a_b_c_d_e_f_9");
    }

    #[test]
    fn case_is_preserved() {
        let id = LogId::format(&ChannelId::from("SomeRoom"), seq(123));
        assert_eq!(id.as_str(), "SomeRoom123");
    }

    #[test]
    fn formatting_is_deterministic() {
        let channel = ChannelId::from("#general");
        assert_eq!(
            LogId::format(&channel, seq(5)),
            LogId::format(&channel, seq(5))
        );
        assert_ne!(
            LogId::format(&channel, seq(5)),
            LogId::format(&channel, seq(6))
        );
    }

    #[test]
    fn file_name_appends_extension() {
        let id = LogId::format(&ChannelId::from("someRoom"), seq(123));
        assert_eq!(id.file_name(), "someRoom123.txt");
    }
}
