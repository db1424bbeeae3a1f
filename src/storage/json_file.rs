/// JSON file implementation of the habit backend
///
/// The whole list lives in one file as a JSON array. Saves replace the file
/// atomically: the new content goes to a temp file in the same directory,
/// is synced, and is then renamed over the old file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::domain::HabitRecord;
use crate::storage::{codec, HabitBackend, StorageError};

/// File-backed storage for the habit list
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[async_trait]
impl HabitBackend for JsonFileBackend {
    async fn load(&self) -> Result<Vec<HabitRecord>, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No habits file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records = codec::decode(&content)?;
        tracing::debug!("Loaded {} habits from {}", records.len(), self.path.display());
        Ok(records)
    }

    async fn save_all(&self, records: &[HabitRecord]) -> Result<(), StorageError> {
        let content = codec::encode(records)?;

        let dir = self.parent_dir();
        fs::create_dir_all(&dir).await?;

        // Atomic replace
        let tmp_path = dir.join(format!(".habits-{}.tmp", Uuid::new_v4()));
        let written = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(e));
        }

        tracing::debug!(
            "Saved {} habits to {} (schema v{})",
            records.len(),
            self.path.display(),
            codec::SCHEMA_VERSION
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
