// ABOUTME: Core library for chanlog: channel logging sessions and their state machine.
// ABOUTME: Defines log ids, session events, the session manager, and the host-facing boundary.

pub mod actor;
pub mod channel;
pub mod command;
pub mod event;
pub mod host;
pub mod log_id;
pub mod manager;
pub mod message;
pub mod session;
pub mod store;
pub mod testing;

pub use actor::{ChannelActorHandle, SessionError};
pub use channel::{Channel, ChannelId, SequenceNumber};
pub use command::{Notice, Outcome, SessionCommand};
pub use event::{LogEvent, LogEventKind, SessionEventPayload};
pub use host::{ChatLogger, CommandContext, HostError, LogCommand, NotificationReceiver};
pub use log_id::{ARTIFACT_EXTENSION, LogId};
pub use manager::{RouteError, Routed, SessionManager};
pub use message::{ChannelMessage, ChannelUser, Notification, NotificationError, render_line};
pub use session::{Session, SessionStatus, SessionTable};
pub use store::{LogArtifacts, PersistenceError, SequenceStore, WriteError};
