// ABOUTME: Append-only JSONL journal of session lifecycle events.
// ABOUTME: Provides crash-safe append, sequential replay, repair, and a background persister task.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chanlog_core::LogEvent;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An append-only JSONL journal backed by a file.
/// Each line is a single JSON-serialized LogEvent followed by a newline.
pub struct EventJournal {
    path: PathBuf,
    file: File,
}

impl EventJournal {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or create) a journal at the given path in append mode.
    /// Creates parent directories if they do not exist.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append one event as a JSON line and fsync.
    pub fn append(&mut self, event: &LogEvent) -> Result<(), JournalError> {
        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{}", json)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay all events in order. Empty lines are skipped; a missing
    /// journal replays as empty.
    pub fn replay(path: &Path) -> Result<Vec<LogEvent>, JournalError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }

    /// Drop unparseable lines (typically a torn final write) so the journal
    /// replays cleanly again. The surviving lines are written to a sibling
    /// temp file which then replaces the journal.
    pub fn repair(path: &Path) -> Result<RepairReport, JournalError> {
        let contents = fs::read_to_string(path)?;
        let (kept, dropped): (Vec<&str>, Vec<&str>) = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .partition(|line| serde_json::from_str::<LogEvent>(line).is_ok());

        let tmp_path = path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(kept.iter().map(|l| format!("{l}\n")).collect::<String>().as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        // Best-effort: the rename already succeeded.
        if let Some(parent) = path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        if !dropped.is_empty() {
            tracing::warn!(
                "repaired journal {}: dropped {} unreadable lines",
                path.display(),
                dropped.len()
            );
        }

        Ok(RepairReport {
            kept: kept.len(),
            dropped: dropped.len(),
        })
    }
}

/// Result of [`EventJournal::repair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub kept: usize,
    pub dropped: usize,
}

/// Spawn a task that appends every broadcast event to the journal at
/// `path`. The task ends when the sender side is dropped.
pub fn spawn_journal_persister(
    mut rx: broadcast::Receiver<LogEvent>,
    path: PathBuf,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut journal = match EventJournal::open(&path) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(
                    "journal persister failed to open {}: {}",
                    path.display(),
                    e
                );
                return;
            }
        };

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = journal.append(&event) {
                        tracing::error!(
                            "journal persister failed to write {} event for {}: {}",
                            event.kind.name(),
                            event.payload.source,
                            e
                        );
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("journal persister lagged, missed {} events", missed);
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("journal persister shutting down (channel closed)");
                    break;
                }
            }
        }
    })
}
