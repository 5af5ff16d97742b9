// ABOUTME: Configuration loading and validation for the chanlog binary.
// ABOUTME: Reads CHANLOG_* environment variables, with a command-line log directory taking precedence.

use std::path::PathBuf;

use chanlog_store::manager::{DEFAULT_DB_FILE, DEFAULT_JOURNAL_FILE};
use thiserror::Error;

pub const DEFAULT_LOGDIR: &str = "logs";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is set but empty")]
    Empty(&'static str),

    #[error("log directory {0} exists and is not a directory")]
    NotADirectory(PathBuf),
}

/// Where chanlog keeps its artifacts and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChanlogConfig {
    pub logdir: PathBuf,
    pub db_path: PathBuf,
    pub journal_path: PathBuf,
}

impl ChanlogConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - CHANLOG_LOGDIR: directory for log artifacts (default: ./logs)
    /// - CHANLOG_DB: sequence database (default: <logdir>/sequences.db)
    /// - CHANLOG_JOURNAL: session event journal (default: <logdir>/sessions.jsonl)
    ///
    /// `logdir_override` replaces CHANLOG_LOGDIR when given.
    pub fn from_env(logdir_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok(), logdir_override)
    }

    fn from_vars(
        get: impl Fn(&str) -> Option<String>,
        logdir_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let path_var = |key: &'static str| -> Result<Option<PathBuf>, ConfigError> {
            match get(key) {
                Some(v) if v.trim().is_empty() => Err(ConfigError::Empty(key)),
                Some(v) => Ok(Some(PathBuf::from(v))),
                None => Ok(None),
            }
        };

        let logdir = match logdir_override {
            Some(dir) => dir,
            None => path_var("CHANLOG_LOGDIR")?.unwrap_or_else(|| PathBuf::from(DEFAULT_LOGDIR)),
        };
        if logdir.exists() && !logdir.is_dir() {
            return Err(ConfigError::NotADirectory(logdir));
        }

        let db_path = path_var("CHANLOG_DB")?.unwrap_or_else(|| logdir.join(DEFAULT_DB_FILE));
        let journal_path =
            path_var("CHANLOG_JOURNAL")?.unwrap_or_else(|| logdir.join(DEFAULT_JOURNAL_FILE));

        Ok(Self {
            logdir,
            db_path,
            journal_path,
        })
    }
}
