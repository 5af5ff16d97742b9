// ABOUTME: Line-oriented console host that drives the chat logger from standard input.
// ABOUTME: Each line is `<channel> <user> <text>`; text starting with `!` invokes a log command.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chanlog_core::{
    Channel, ChannelMessage, ChatLogger, CommandContext, HostError, LogCommand, Notification,
    Outcome,
};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Prefix that marks a line's text as a command.
pub const COMMAND_PREFIX: char = '!';

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Command {
        channel: String,
        user: String,
        name: String,
        args: Vec<String>,
    },
    Message {
        channel: String,
        user: String,
        text: String,
    },
}

impl ConsoleLine {
    /// Parse a line. Blank lines and lines missing a user are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(3, ' ');
        let channel = parts.next().filter(|c| !c.is_empty())?.to_string();
        let user = parts.next().filter(|u| !u.is_empty())?.to_string();
        let text = parts.next().unwrap_or("");

        match text.strip_prefix(COMMAND_PREFIX) {
            Some(invocation) => {
                let mut words = invocation.split_whitespace();
                let name = words.next()?.to_string();
                Some(ConsoleLine::Command {
                    channel,
                    user,
                    name,
                    args: words.map(str::to_string).collect(),
                })
            }
            None => Some(ConsoleLine::Message {
                channel,
                user,
                text: text.to_string(),
            }),
        }
    }
}

/// Command context for one console command. Replies are collected so the
/// host can print them after the command completes.
struct ConsoleContext {
    channel: String,
    requestor: String,
    args: Vec<String>,
    replies: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandContext for ConsoleContext {
    async fn channel(&self) -> Result<Channel, HostError> {
        Ok(Channel::new(self.channel.clone(), self.channel.clone()))
    }

    fn requestor(&self) -> &str {
        &self.requestor
    }

    async fn reply(&self, text: &str) -> Result<(), HostError> {
        self.replies
            .lock()
            .map_err(|_| HostError::Context("reply buffer poisoned".to_string()))?
            .push(text.to_string());
        Ok(())
    }

    fn args(&self) -> &[String] {
        &self.args
    }
}

/// Feeds console input into a [`ChatLogger`]: commands are dispatched
/// directly, messages go through the logger's notification stream.
pub struct ConsoleHost {
    logger: Arc<ChatLogger>,
    notifications: mpsc::Sender<Box<dyn Notification>>,
}

impl ConsoleHost {
    /// Activate `logger` with a fresh notification stream owned by this host.
    pub async fn attach(logger: Arc<ChatLogger>) -> Result<Self, HostError> {
        let (tx, rx) = mpsc::channel::<Box<dyn Notification>>(256);
        logger.activate(rx).await?;
        Ok(Self {
            logger,
            notifications: tx,
        })
    }

    /// Handle one input line, returning the text to show the operator.
    pub async fn handle_line(&self, line: &str) -> Vec<String> {
        match ConsoleLine::parse(line) {
            Some(ConsoleLine::Command {
                channel,
                user,
                name,
                args,
            }) => {
                let ctx = ConsoleContext {
                    channel: channel.clone(),
                    requestor: user,
                    args,
                    replies: Mutex::new(Vec::new()),
                };
                let result = self.logger.handle_command(&name, &ctx).await;
                let mut output: Vec<String> = ctx
                    .replies
                    .into_inner()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| format!("[{}] {}", channel, r))
                    .collect();
                match result {
                    Ok(Outcome::Notice(notice)) => {
                        tracing::debug!(%channel, %notice, "command refused");
                    }
                    Ok(_) => {}
                    Err(HostError::UnknownCommand(_)) => {
                        output.push(format!("[{}] unknown command: {}", channel, name));
                        output.extend(LogCommand::ALL.iter().map(|c| {
                            format!("[{}]   {}{}: {}", channel, COMMAND_PREFIX, c.name(), c.help())
                        }));
                    }
                    Err(e) => {
                        tracing::error!(%channel, command = %name, error = %e, "command failed");
                        output.push(format!("[{}] command failed: {}", channel, e));
                    }
                }
                output
            }
            Some(ConsoleLine::Message {
                channel,
                user,
                text,
            }) => {
                let message = ChannelMessage::new(channel, user, text, Utc::now());
                if self.notifications.send(Box::new(message)).await.is_err() {
                    tracing::warn!("notification stream closed, message dropped");
                }
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Read lines until end of input, printing replies to stdout.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> std::io::Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            for out in self.handle_line(&line).await {
                println!("{}", out);
            }
        }
        Ok(())
    }

    /// Stop routing and shut down the logger's channel actors.
    pub async fn detach(self) {
        drop(self.notifications);
        self.logger.deactivate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlog_core::SessionManager;
    use chanlog_core::testing::{MemoryArtifacts, MemorySequenceStore};

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            ConsoleLine::parse("#someRoom kaelas !resume 123"),
            Some(ConsoleLine::Command {
                channel: "#someRoom".to_string(),
                user: "kaelas".to_string(),
                name: "resume".to_string(),
                args: vec!["123".to_string()],
            })
        );
    }

    #[test]
    fn parses_messages_keeping_inner_spacing() {
        assert_eq!(
            ConsoleLine::parse("#crossings_ooc accalia hello  there\n"),
            Some(ConsoleLine::Message {
                channel: "#crossings_ooc".to_string(),
                user: "accalia".to_string(),
                text: "hello  there".to_string(),
            })
        );
    }

    #[test]
    fn ignores_incomplete_lines() {
        assert_eq!(ConsoleLine::parse(""), None);
        assert_eq!(ConsoleLine::parse("#room"), None);
        assert_eq!(ConsoleLine::parse("#room user !"), None);
    }

    #[tokio::test]
    async fn commands_print_replies_and_messages_are_routed() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let manager = Arc::new(SessionManager::new(
            Arc::new(MemorySequenceStore::with_entry("#room", 4)),
            artifacts.clone(),
        ));
        let logger = Arc::new(ChatLogger::new(manager));
        let host = ConsoleHost::attach(Arc::clone(&logger)).await.unwrap();

        assert_eq!(
            host.handle_line("#room op !logStart").await,
            vec!["[#room] Started logging to room5"]
        );
        assert!(host.handle_line("#room accalia hi").await.is_empty());
        assert_eq!(
            host.handle_line("#room op !logStart").await,
            vec!["[#room] Error: Log already in progress"]
        );

        for _ in 0..500 {
            if artifacts.lines("room5").len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        host.detach().await;

        assert_eq!(artifacts.lines("room5").len(), 1);
        assert!(artifacts.lines("room5")[0].ends_with("<accalia> hi\n"));
        assert!(!logger.is_active().await);
    }

    #[tokio::test]
    async fn unknown_command_lists_available_commands() {
        let manager = Arc::new(SessionManager::new(
            Arc::new(MemorySequenceStore::new()),
            Arc::new(MemoryArtifacts::new()),
        ));
        let host = ConsoleHost::attach(Arc::new(ChatLogger::new(manager)))
            .await
            .unwrap();

        let out = host.handle_line("#room op !logRotate").await;

        assert_eq!(out.len(), 1 + LogCommand::ALL.len());
        assert_eq!(out[0], "[#room] unknown command: logRotate");
        assert_eq!(
            out[1],
            "[#room]   !logStart: Start a log file in the current channel"
        );
        host.detach().await;
    }
}
