// ABOUTME: The session manager: owns the session table, one actor per channel, and message routing.
// ABOUTME: Session mutations go through per-channel actors; routing reads the table directly.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, broadcast};

use crate::actor::{self, ActorDeps, ChannelActorHandle, SessionError};
use crate::channel::{ChannelId, SequenceNumber};
use crate::command::{Outcome, SessionCommand};
use crate::event::LogEvent;
use crate::log_id::LogId;
use crate::message::{Notification, NotificationError, render_line};
use crate::session::{Session, SessionTable};
use crate::store::{LogArtifacts, SequenceStore, WriteError};

/// Errors that fail a single routing call. The session stays active.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// What routing did with a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// The channel is not being logged.
    Skipped,
    /// One line was appended to this log.
    Appended(LogId),
}

/// Coordinates logging sessions for every channel in the process.
pub struct SessionManager {
    sessions: Arc<RwLock<SessionTable>>,
    actors: RwLock<HashMap<ChannelId, Arc<ChannelActorHandle>>>,
    store: Arc<dyn SequenceStore>,
    artifacts: Arc<dyn LogArtifacts>,
    event_tx: broadcast::Sender<LogEvent>,
}

impl SessionManager {
    /// Create a manager with an empty session table.
    pub fn new(store: Arc<dyn SequenceStore>, artifacts: Arc<dyn LogArtifacts>) -> Self {
        let (event_tx, _) = broadcast::channel::<LogEvent>(256);
        Self {
            sessions: Arc::new(RwLock::new(SessionTable::new())),
            actors: RwLock::new(HashMap::new()),
            store,
            artifacts,
            event_tx,
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.event_tx.subscribe()
    }

    pub async fn start(&self, channel: &ChannelId, requestor: &str) -> Result<Outcome, SessionError> {
        self.send(
            channel,
            SessionCommand::Start {
                requestor: requestor.to_string(),
            },
        )
        .await
    }

    pub async fn end(&self, channel: &ChannelId, requestor: &str) -> Result<Outcome, SessionError> {
        self.send(
            channel,
            SessionCommand::End {
                requestor: requestor.to_string(),
            },
        )
        .await
    }

    pub async fn pause(&self, channel: &ChannelId, requestor: &str) -> Result<Outcome, SessionError> {
        self.send(
            channel,
            SessionCommand::Pause {
                requestor: requestor.to_string(),
            },
        )
        .await
    }

    pub async fn resume(
        &self,
        channel: &ChannelId,
        requestor: &str,
        sequence: SequenceNumber,
    ) -> Result<Outcome, SessionError> {
        self.send(
            channel,
            SessionCommand::Resume {
                requestor: requestor.to_string(),
                sequence,
            },
        )
        .await
    }

    /// Send any session command to the channel's actor, spawning it on first
    /// use. The actor is retired again once the channel is idle, so only
    /// logging channels and in-flight commands hold an actor.
    pub async fn send(&self, channel: &ChannelId, cmd: SessionCommand) -> Result<Outcome, SessionError> {
        let handle = self.actor_for(channel).await;
        let result = handle.send_command(cmd).await;
        drop(handle);
        self.retire_if_idle(channel).await;
        result
    }

    /// Append the notification to its channel's active log, if there is one.
    pub async fn route(&self, notification: &dyn Notification) -> Result<Routed, RouteError> {
        let channel = ChannelId::from(notification.topic_id());
        let Some(log_id) = self.active_log_id(&channel).await else {
            return Ok(Routed::Skipped);
        };

        let text = notification.text().await?;
        let user = notification.user().await?;
        let line = render_line(notification.date(), &user.username, &text);

        if let Err(e) = self.artifacts.append(&log_id, &line).await {
            tracing::warn!(%channel, %log_id, error = %e, "failed to append message");
            return Err(e.into());
        }

        tracing::debug!(%channel, %log_id, "appended message");
        Ok(Routed::Appended(log_id))
    }

    pub async fn is_logging(&self, channel: &ChannelId) -> bool {
        self.sessions.read().await.contains(channel)
    }

    pub async fn active_log_id(&self, channel: &ChannelId) -> Option<LogId> {
        self.sessions.read().await.log_id(channel).cloned()
    }

    /// Snapshot of all active sessions.
    pub async fn active_sessions(&self) -> Vec<Session> {
        self.sessions.read().await.sessions()
    }

    /// Drop every actor handle. Actors finish queued commands and exit;
    /// a later command for a channel spawns a fresh actor.
    pub async fn shutdown(&self) {
        let mut actors = self.actors.write().await;
        tracing::info!(actors = actors.len(), "stopping channel actors");
        actors.clear();
    }

    async fn actor_for(&self, channel: &ChannelId) -> Arc<ChannelActorHandle> {
        if let Some(handle) = self.actors.read().await.get(channel) {
            return Arc::clone(handle);
        }

        let mut actors = self.actors.write().await;
        let handle = actors
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(actor::spawn(channel.clone(), self.deps())));
        Arc::clone(handle)
    }

    // Handles are only cloned under the map lock and held until the reply
    // arrives, so a strong count of one under the write lock means no command
    // is queued or in flight for this channel.
    async fn retire_if_idle(&self, channel: &ChannelId) {
        let mut actors = self.actors.write().await;
        let unused = actors
            .get(channel)
            .is_some_and(|handle| Arc::strong_count(handle) == 1);
        if unused && !self.sessions.read().await.contains(channel) {
            actors.remove(channel);
            tracing::debug!(%channel, "retired idle channel actor");
        }
    }

    fn deps(&self) -> ActorDeps {
        ActorDeps {
            sessions: Arc::clone(&self.sessions),
            store: Arc::clone(&self.store),
            artifacts: Arc::clone(&self.artifacts),
            event_tx: self.event_tx.clone(),
        }
    }
}
