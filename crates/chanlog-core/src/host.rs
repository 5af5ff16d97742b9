// ABOUTME: Boundary to the hosting chat framework: command dispatch, replies, and notification intake.
// ABOUTME: ChatLogger maps host commands onto the session manager and runs the routing task.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actor::SessionError;
use crate::channel::{Channel, SequenceNumber};
use crate::command::{Notice, Outcome};
use crate::manager::SessionManager;
use crate::message::Notification;

/// Errors surfaced to the host. User-facing conflicts never appear here;
/// they are replied to and returned as [`Outcome::Notice`].
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("host context failed: {0}")]
    Context(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("chat logger is already active")]
    AlreadyActive,
}

/// What the host exposes to a command handler.
#[async_trait]
pub trait CommandContext: Send + Sync {
    /// The channel the command was issued in.
    async fn channel(&self) -> Result<Channel, HostError>;

    /// Identity of whoever issued the command.
    fn requestor(&self) -> &str;

    /// Send user-visible text back to the requestor.
    async fn reply(&self, text: &str) -> Result<(), HostError>;

    /// Positional arguments following the command name.
    fn args(&self) -> &[String];
}

/// The commands the chat logger registers with its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCommand {
    LogStart,
    LogEnd,
    Pause,
    Resume,
}

impl LogCommand {
    pub const ALL: [LogCommand; 4] = [
        LogCommand::LogStart,
        LogCommand::LogEnd,
        LogCommand::Pause,
        LogCommand::Resume,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogCommand::LogStart => "logStart",
            LogCommand::LogEnd => "logEnd",
            LogCommand::Pause => "pause",
            LogCommand::Resume => "resume",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            LogCommand::LogStart => "Start a log file in the current channel",
            LogCommand::LogEnd => "End a log file in the current channel",
            LogCommand::Pause => "Pause the log file in the current channel",
            LogCommand::Resume => "Resume a log file in the current channel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Stream of notifications the host delivers once the logger is active.
pub type NotificationReceiver = mpsc::Receiver<Box<dyn Notification>>;

struct RouterTask {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// The chat-logging plugin as the host sees it.
pub struct ChatLogger {
    manager: Arc<SessionManager>,
    router: Mutex<Option<RouterTask>>,
}

impl ChatLogger {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            router: Mutex::new(None),
        }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Run the named command in `ctx`, reply with the outcome, and return it.
    pub async fn handle_command(
        &self,
        name: &str,
        ctx: &dyn CommandContext,
    ) -> Result<Outcome, HostError> {
        let command =
            LogCommand::from_name(name).ok_or_else(|| HostError::UnknownCommand(name.to_string()))?;
        let channel = ctx.channel().await?;
        let requestor = ctx.requestor();

        let outcome = match command {
            LogCommand::LogStart => self.manager.start(&channel.id, requestor).await?,
            LogCommand::LogEnd => self.manager.end(&channel.id, requestor).await?,
            LogCommand::Pause => self.manager.pause(&channel.id, requestor).await?,
            LogCommand::Resume => match ctx.args().first().and_then(|a| SequenceNumber::parse(a)) {
                Some(sequence) => self.manager.resume(&channel.id, requestor, sequence).await?,
                None => Outcome::Notice(Notice::MissingLogNumber),
            },
        };

        ctx.reply(&outcome.reply_text()).await?;
        Ok(outcome)
    }

    /// Subscribe to the host's notification stream. Each notification is
    /// routed in arrival order; failures are logged and the loop continues.
    pub async fn activate(&self, mut notifications: NotificationReceiver) -> Result<(), HostError> {
        let mut router = self.router.lock().await;
        if router.is_some() {
            return Err(HostError::AlreadyActive);
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let manager = Arc::clone(&self.manager);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    next = notifications.recv() => {
                        let Some(notification) = next else { break };
                        if let Err(e) = manager.route(notification.as_ref()).await {
                            tracing::warn!(
                                channel = notification.topic_id(),
                                error = %e,
                                "dropped message"
                            );
                        }
                    }
                }
            }
            tracing::debug!("notification routing stopped");
        });

        *router = Some(RouterTask { shutdown_tx, task });
        tracing::info!("chat logger activated");
        Ok(())
    }

    /// Unsubscribe from notifications and stop every channel actor.
    pub async fn deactivate(&self) {
        if let Some(router) = self.router.lock().await.take() {
            let _ = router.shutdown_tx.send(());
            if let Err(e) = router.task.await {
                tracing::error!(error = %e, "routing task panicked");
            }
        }
        for session in self.manager.active_sessions().await {
            tracing::info!(
                channel = %session.channel_id,
                log_id = %session.log_id,
                "channel still logging at deactivation"
            );
        }
        self.manager.shutdown().await;
        tracing::info!("chat logger deactivated");
    }

    pub async fn is_active(&self) -> bool {
        self.router.lock().await.is_some()
    }
}
