// ABOUTME: Per-channel async actor that serializes session commands through a tokio channel.
// ABOUTME: Provides ChannelActorHandle for sending commands; events go out on a shared broadcast.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};

use crate::channel::ChannelId;
use crate::command::{Notice, Outcome, SessionCommand};
use crate::event::{LogEvent, LogEventKind};
use crate::log_id::LogId;
use crate::session::{Session, SessionTable};
use crate::store::{LogArtifacts, PersistenceError, SequenceStore, WriteError};

/// Errors that can occur when processing session commands.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not issue a log number: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("could not create the log: {0}")]
    Write(#[from] WriteError),

    #[error("actor channel closed")]
    ChannelClosed,
}

/// Message type sent through the command channel: a command paired with
/// a oneshot sender for the response.
type CommandMessage = (
    SessionCommand,
    oneshot::Sender<Result<Outcome, SessionError>>,
);

/// Collaborators every channel actor shares.
#[derive(Clone)]
pub struct ActorDeps {
    pub sessions: Arc<RwLock<SessionTable>>,
    pub store: Arc<dyn SequenceStore>,
    pub artifacts: Arc<dyn LogArtifacts>,
    pub event_tx: broadcast::Sender<LogEvent>,
}

/// Public handle for sending commands to one channel's actor.
#[derive(Clone)]
pub struct ChannelActorHandle {
    cmd_tx: mpsc::Sender<CommandMessage>,
    pub channel_id: ChannelId,
}

impl ChannelActorHandle {
    /// Send a command to the actor and await its outcome.
    pub async fn send_command(&self, cmd: SessionCommand) -> Result<Outcome, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send((cmd, tx))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }
}

/// Spawn the actor owning session mutations for `channel_id`. Commands are
/// processed one at a time, so concurrent requests for the same channel can
/// never both start a session or both consume a sequence number.
pub fn spawn(channel_id: ChannelId, deps: ActorDeps) -> ChannelActorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<CommandMessage>(32);

    let handle = ChannelActorHandle {
        cmd_tx,
        channel_id: channel_id.clone(),
    };

    let actor = ChannelActor {
        channel_id,
        deps,
        cmd_rx,
    };

    tokio::spawn(actor.run());

    handle
}

/// The internal actor that processes commands in a loop.
struct ChannelActor {
    channel_id: ChannelId,
    deps: ActorDeps,
    cmd_rx: mpsc::Receiver<CommandMessage>,
}

impl ChannelActor {
    async fn run(mut self) {
        while let Some((cmd, reply_tx)) = self.cmd_rx.recv().await {
            let result = self.process_command(cmd).await;
            // The caller may have dropped their receiver
            let _ = reply_tx.send(result);
        }
        tracing::debug!(channel = %self.channel_id, "channel actor stopped");
    }

    // Only this actor writes this channel's table entry, so a presence check
    // stays valid across the awaits that follow it.
    async fn process_command(&mut self, cmd: SessionCommand) -> Result<Outcome, SessionError> {
        match cmd {
            SessionCommand::Start { requestor } => self.start(requestor).await,
            SessionCommand::End { requestor } => {
                self.stop(requestor, LogEventKind::LogEnd).await
            }
            SessionCommand::Pause { requestor } => {
                self.stop(requestor, LogEventKind::LogPause).await
            }
            SessionCommand::Resume {
                requestor,
                sequence,
            } => {
                if self.is_logging().await {
                    return Ok(Outcome::Notice(Notice::AlreadyLogging));
                }

                let log_id = LogId::format(&self.channel_id, sequence);
                if !self.deps.artifacts.artifact_exists(&log_id).await {
                    tracing::info!(channel = %self.channel_id, %log_id, "no log to resume");
                    return Ok(Outcome::Notice(Notice::NoSuchLog(log_id)));
                }

                let session = Session::active(self.channel_id.clone(), sequence);
                self.deps.sessions.write().await.insert(session);
                tracing::info!(channel = %self.channel_id, %log_id, %requestor, "resumed logging");
                self.emit(LogEventKind::LogResume, requestor, log_id.clone());

                Ok(Outcome::Resumed { log_id })
            }
        }
    }

    async fn start(&mut self, requestor: String) -> Result<Outcome, SessionError> {
        if self.is_logging().await {
            return Ok(Outcome::Notice(Notice::AlreadyLogging));
        }

        let sequence = match self.deps.store.next(&self.channel_id).await {
            Ok(sequence) => sequence,
            Err(e) => {
                tracing::error!(channel = %self.channel_id, error = %e, "failed to issue log number");
                return Err(e.into());
            }
        };

        // Resume requires the artifact to exist, even if nothing was logged.
        let session = Session::active(self.channel_id.clone(), sequence);
        let log_id = session.log_id.clone();
        if let Err(e) = self.deps.artifacts.touch(&log_id).await {
            tracing::error!(channel = %self.channel_id, %log_id, error = %e, "failed to create log");
            return Err(e.into());
        }
        self.deps.sessions.write().await.insert(session);
        tracing::info!(channel = %self.channel_id, %log_id, %requestor, "started logging");
        self.emit(LogEventKind::LogStart, requestor, log_id.clone());

        Ok(Outcome::Started { log_id, sequence })
    }

    /// End and pause share mechanics; only the emitted event differs.
    async fn stop(&mut self, requestor: String, kind: LogEventKind) -> Result<Outcome, SessionError> {
        let removed = self.deps.sessions.write().await.remove(&self.channel_id);
        let Some(session) = removed else {
            return Ok(Outcome::Notice(Notice::NotLogging));
        };

        tracing::info!(
            channel = %self.channel_id,
            log_id = %session.log_id,
            %requestor,
            event = kind.name(),
            "stopped logging"
        );
        self.emit(kind, requestor, session.log_id.clone());

        Ok(match kind {
            LogEventKind::LogPause => Outcome::Paused {
                log_id: session.log_id,
                sequence: session.sequence,
            },
            _ => Outcome::Ended {
                log_id: session.log_id,
            },
        })
    }

    async fn is_logging(&self) -> bool {
        self.deps.sessions.read().await.contains(&self.channel_id)
    }

    fn emit(&self, kind: LogEventKind, requestor: String, log_id: LogId) {
        let event = LogEvent::new(kind, self.channel_id.clone(), requestor, log_id);
        // No active subscribers is fine
        let _ = self.deps.event_tx.send(event);
    }
}
