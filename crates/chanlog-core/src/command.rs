// ABOUTME: Session commands accepted by a channel actor and the outcomes they produce.
// ABOUTME: User-facing conflicts are ordinary outcomes (Notice), never errors.

use std::fmt;

use crate::channel::SequenceNumber;
use crate::log_id::LogId;

/// A requested change to one channel's logging state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start { requestor: String },
    End { requestor: String },
    Pause { requestor: String },
    Resume {
        requestor: String,
        sequence: SequenceNumber,
    },
}

/// Expected, non-fatal refusals. State is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Start or resume on a channel that is already being logged.
    AlreadyLogging,
    /// End or pause on a channel that is not being logged.
    NotLogging,
    /// Resume onto a log whose artifact does not exist.
    NoSuchLog(LogId),
    /// Resume without a usable sequence number argument.
    MissingLogNumber,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AlreadyLogging => f.write_str("Error: Log already in progress"),
            Notice::NotLogging => f.write_str("Error: No logging in progress to end"),
            Notice::NoSuchLog(_) => f.write_str("Error: No such log to resume"),
            Notice::MissingLogNumber => f.write_str("Error: resume needs a log number"),
        }
    }
}

/// Result of a successfully processed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started {
        log_id: LogId,
        sequence: SequenceNumber,
    },
    Ended {
        log_id: LogId,
    },
    Paused {
        log_id: LogId,
        sequence: SequenceNumber,
    },
    Resumed {
        log_id: LogId,
    },
    Notice(Notice),
}

impl Outcome {
    /// Text to send back through the host's reply sink.
    pub fn reply_text(&self) -> String {
        match self {
            Outcome::Started { log_id, .. } => format!("Started logging to {}", log_id),
            Outcome::Ended { log_id } => format!("Stopped logging to {}", log_id),
            Outcome::Paused { log_id, sequence } => format!(
                "Paused logging to {} (resume with: resume {})",
                log_id, sequence
            ),
            Outcome::Resumed { .. } => "Resumed logging".to_string(),
            Outcome::Notice(notice) => notice.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;

    fn log_id(channel: &str, seq: u64) -> LogId {
        LogId::format(&ChannelId::from(channel), SequenceNumber::new(seq).unwrap())
    }

    #[test]
    fn notice_texts() {
        assert_eq!(
            Outcome::Notice(Notice::AlreadyLogging).reply_text(),
            "Error: Log already in progress"
        );
        assert_eq!(
            Outcome::Notice(Notice::NotLogging).reply_text(),
            "Error: No logging in progress to end"
        );
        assert_eq!(
            Outcome::Notice(Notice::NoSuchLog(log_id("someRoom", 123))).reply_text(),
            "Error: No such log to resume"
        );
    }

    #[test]
    fn success_texts() {
        assert_eq!(
            Outcome::Resumed {
                log_id: log_id("someRoom", 123)
            }
            .reply_text(),
            "Resumed logging"
        );
        assert_eq!(
            Outcome::Paused {
                log_id: log_id("#crossings_ooc", 24),
                sequence: SequenceNumber::new(24).unwrap(),
            }
            .reply_text(),
            "Paused logging to crossings_ooc24 (resume with: resume 24)"
        );
    }
}
