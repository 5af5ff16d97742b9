// ABOUTME: Persistence layer for chanlog: durable sequence numbers, log artifacts, and the event journal.
// ABOUTME: Provides the SQLite sequence store, file-backed artifacts, JSONL journal, and directory layout.

pub mod artifact;
pub mod journal;
pub mod manager;
pub mod sqlite;

pub use artifact::FileArtifacts;
pub use journal::{EventJournal, JournalError, RepairReport, spawn_journal_persister};
pub use manager::{ArtifactEntry, ManagerError, StorageManager};
pub use sqlite::{SqliteError, SqliteSequenceStore};
