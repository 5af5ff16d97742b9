// ABOUTME: Append-only text log artifacts, one file per (channel, sequence) under the log directory.
// ABOUTME: Resolves `<logdir>/<LogId>.txt` identically for resume existence checks and appends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chanlog_core::{LogArtifacts, LogId, WriteError};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Log artifacts stored as UTF-8 text files in a single directory.
#[derive(Debug, Clone)]
pub struct FileArtifacts {
    dir: PathBuf,
}

impl FileArtifacts {
    /// Artifacts under `dir`. The directory is created on first write if
    /// it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `log_id`.
    pub fn path_for(&self, log_id: &LogId) -> PathBuf {
        self.dir.join(log_id.file_name())
    }
}

#[async_trait]
impl LogArtifacts for FileArtifacts {
    async fn artifact_exists(&self, log_id: &LogId) -> bool {
        let path = self.path_for(log_id);
        match tokio::fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not check for log artifact");
                false
            }
        }
    }

    async fn touch(&self, log_id: &LogId) -> Result<(), WriteError> {
        let path = self.path_for(log_id);
        let io = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let file = OpenOptions::new().create(true).append(true).open(&path).await?;
            file.sync_data().await
        };
        io.await.map_err(|e| WriteError::new(log_id.clone(), e))
    }

    /// Opens, appends, and syncs on every call. Each line goes out in a
    /// single write on an O_APPEND handle.
    async fn append(&self, log_id: &LogId, line: &str) -> Result<(), WriteError> {
        let path = self.path_for(log_id);
        let io = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
            file.write_all(line.as_bytes()).await?;
            file.sync_data().await?;
            Ok::<(), std::io::Error>(())
        };
        io.await.map_err(|e| WriteError::new(log_id.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlog_core::{ChannelId, SequenceNumber};
    use tempfile::TempDir;

    fn log_id(channel: &str, seq: u64) -> LogId {
        LogId::format(&ChannelId::from(channel), SequenceNumber::new(seq).unwrap())
    }

    #[test]
    fn path_uses_log_id_and_txt_extension() {
        let artifacts = FileArtifacts::new("../logs");
        assert_eq!(
            artifacts.path_for(&log_id("someChannel", 1)),
            PathBuf::from("../logs/someChannel1.txt")
        );
        assert_eq!(
            artifacts.path_for(&log_id("#crossings_ooc", 24)),
            PathBuf::from("../logs/crossings_ooc24.txt")
        );
    }

    #[tokio::test]
    async fn append_creates_and_extends_file() {
        let dir = TempDir::new().unwrap();
        let artifacts = FileArtifacts::new(dir.path().join("logs"));
        let id = log_id("someChannel", 1);

        assert!(!artifacts.artifact_exists(&id).await);

        artifacts.append(&id, "[00:00] <a> one\n").await.unwrap();
        artifacts.append(&id, "[00:00] <a> two\n").await.unwrap();

        assert!(artifacts.artifact_exists(&id).await);
        let contents = std::fs::read_to_string(artifacts.path_for(&id)).unwrap();
        assert_eq!(contents, "[00:00] <a> one\n[00:00] <a> two\n");
    }

    #[tokio::test]
    async fn touch_creates_empty_artifact_and_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let artifacts = FileArtifacts::new(dir.path().join("logs"));
        let id = log_id("#room", 1);

        artifacts.touch(&id).await.unwrap();
        assert!(artifacts.artifact_exists(&id).await);
        assert_eq!(std::fs::read_to_string(artifacts.path_for(&id)).unwrap(), "");

        artifacts.append(&id, "[00:00] <a> hi\n").await.unwrap();
        artifacts.touch(&id).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(artifacts.path_for(&id)).unwrap(),
            "[00:00] <a> hi\n"
        );
    }

    #[tokio::test]
    async fn touch_failure_names_the_log() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("not_a_dir");
        std::fs::write(&blocked, "").unwrap();
        let artifacts = FileArtifacts::new(&blocked);
        let id = log_id("#room", 1);

        let err = artifacts.touch(&id).await.unwrap_err();
        assert_eq!(err.log_id, id);
    }

    #[tokio::test]
    async fn append_never_truncates_existing_content() {
        let dir = TempDir::new().unwrap();
        let artifacts = FileArtifacts::new(dir.path());
        let id = log_id("someRoom", 123);
        std::fs::write(artifacts.path_for(&id), "earlier\n").unwrap();

        artifacts.append(&id, "later\n").await.unwrap();

        let contents = std::fs::read_to_string(artifacts.path_for(&id)).unwrap();
        assert_eq!(contents, "earlier\nlater\n");
    }

    #[tokio::test]
    async fn append_failure_names_the_log() {
        let dir = TempDir::new().unwrap();
        // A regular file where the log directory should be
        let blocked = dir.path().join("not_a_dir");
        std::fs::write(&blocked, "").unwrap();
        let artifacts = FileArtifacts::new(&blocked);
        let id = log_id("someChannel", 1);

        let err = artifacts.append(&id, "line\n").await.unwrap_err();
        assert_eq!(err.log_id, id);
    }

    #[tokio::test]
    async fn unicode_lines_are_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let artifacts = FileArtifacts::new(dir.path());
        let id = log_id("#café", 2);

        artifacts.append(&id, "[12:30] <zoë> héllo ☃\n").await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("café2.txt")).unwrap();
        assert_eq!(contents, "[12:30] <zoë> héllo ☃\n");
    }
}
