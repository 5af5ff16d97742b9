// ABOUTME: High-level storage manager for the chanlog log directory layout.
// ABOUTME: Creates the log directory, opens the sequence store, and discovers existing artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use chanlog_core::{ARTIFACT_EXTENSION, LogEvent};
use thiserror::Error;

use crate::artifact::FileArtifacts;
use crate::journal::{EventJournal, JournalError, RepairReport};
use crate::sqlite::{SqliteError, SqliteSequenceStore};

pub const DEFAULT_DB_FILE: &str = "sequences.db";
pub const DEFAULT_JOURNAL_FILE: &str = "sessions.jsonl";

/// Errors that can occur during storage management operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sequence store error: {0}")]
    Sqlite(#[from] SqliteError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

/// An artifact found in the log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// File stem, which is the log ID the artifact was written under.
    pub log_id: String,
    pub path: PathBuf,
    pub len: u64,
}

/// Owns the on-disk layout: artifacts directly under the log directory,
/// with the sequence database and event journal alongside them unless
/// configured elsewhere.
pub struct StorageManager {
    logdir: PathBuf,
    db_path: PathBuf,
    journal_path: PathBuf,
}

impl StorageManager {
    /// Create a StorageManager rooted at `logdir`, creating it if absent.
    pub fn new(logdir: PathBuf) -> Result<Self, ManagerError> {
        fs::create_dir_all(&logdir)?;
        Ok(Self {
            db_path: logdir.join(DEFAULT_DB_FILE),
            journal_path: logdir.join(DEFAULT_JOURNAL_FILE),
            logdir,
        })
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn with_journal_path(mut self, journal_path: PathBuf) -> Self {
        self.journal_path = journal_path;
        self
    }

    pub fn logdir(&self) -> &Path {
        &self.logdir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Open the sequence store, creating its parent directory if needed.
    pub fn open_sequence_store(&self) -> Result<SqliteSequenceStore, ManagerError> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(SqliteSequenceStore::open(&self.db_path)?)
    }

    pub fn artifacts(&self) -> FileArtifacts {
        FileArtifacts::new(self.logdir.clone())
    }

    /// Replay the event journal, oldest first.
    pub fn replay_journal(&self) -> Result<Vec<LogEvent>, ManagerError> {
        Ok(EventJournal::replay(&self.journal_path)?)
    }

    /// Drop any torn trailing write left by a crash. A missing journal is
    /// left alone.
    pub fn repair_journal(&self) -> Result<Option<RepairReport>, ManagerError> {
        if !self.journal_path.exists() {
            return Ok(None);
        }
        Ok(Some(EventJournal::repair(&self.journal_path)?))
    }

    /// Scan the log directory for artifacts, sorted by log ID.
    /// Entries that are not artifacts are skipped.
    pub fn list_artifacts(&self) -> Result<Vec<ArtifactEntry>, ManagerError> {
        if !self.logdir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.logdir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            let is_artifact = path
                .extension()
                .is_some_and(|ext| ext == ARTIFACT_EXTENSION);
            let stem = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);

            match (is_artifact, stem) {
                (true, Some(log_id)) => {
                    let len = entry.metadata()?.len();
                    results.push(ArtifactEntry { log_id, path, len });
                }
                _ => {
                    if !self.is_state_file(&path) {
                        tracing::warn!(
                            "skipping non-artifact entry in log directory: {}",
                            entry.file_name().to_string_lossy()
                        );
                    }
                }
            }
        }

        results.sort_by(|a, b| a.log_id.cmp(&b.log_id));
        Ok(results)
    }

    /// The sequence database (with its WAL and shared-memory siblings) or
    /// the journal.
    fn is_state_file(&self, path: &Path) -> bool {
        if path == self.journal_path || path == self.db_path {
            return true;
        }
        ["-wal", "-shm", "-journal"].iter().any(|suffix| {
            let mut sibling = self.db_path.clone().into_os_string();
            sibling.push(suffix);
            path == Path::new(&sibling)
        })
    }
}
