/// Runtime configuration: where habits live and which backend stores them

use std::path::{Path, PathBuf};
use std::sync::Arc;
use clap::ValueEnum;

use crate::storage::{HabitBackend, JsonFileBackend, SqliteBackend, StorageError};

/// Storage medium for the habit list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// One JSON array in `habits.json`
    #[default]
    Json,
    /// One row per habit in `habits.db`
    Sqlite,
}

/// Resolved locations for one tracker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub backend: BackendKind,
}

impl TrackerConfig {
    pub fn new(data_dir: impl Into<PathBuf>, backend: BackendKind) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend,
        }
    }

    /// File holding the habit list for the configured backend
    pub fn habits_path(&self) -> PathBuf {
        match self.backend {
            BackendKind::Json => self.data_dir.join("habits.json"),
            BackendKind::Sqlite => self.data_dir.join("habits.db"),
        }
    }

    /// File holding the date of the last rollover
    pub fn marker_path(&self) -> PathBuf {
        self.data_dir.join("last_rollover")
    }

    /// Create the data directory and open the configured backend
    pub fn open_backend(&self) -> Result<Arc<dyn HabitBackend>, StorageError> {
        std::fs::create_dir_all(&self.data_dir)?;

        let backend: Arc<dyn HabitBackend> = match self.backend {
            BackendKind::Json => Arc::new(JsonFileBackend::new(self.habits_path())),
            BackendKind::Sqlite => Arc::new(SqliteBackend::new(self.habits_path())?),
        };
        Ok(backend)
    }
}

/// Get the default data directory with a fallback strategy
///
/// Candidates are tried in order of preference; the first one that can be
/// created and written to wins. The system temp directory is the last resort.
pub fn default_data_dir() -> Result<PathBuf, std::io::Error> {
    let candidates = [
        // 1. User's home directory (preferred)
        dirs::home_dir().map(|p| p.join(".habit_sync")),
        // 2. User's data directory (platform-specific)
        dirs::data_dir().map(|p| p.join("habit_sync")),
        // 3. User's config directory
        dirs::config_dir().map(|p| p.join("habit_sync")),
        // 4. Current working directory
        std::env::current_dir().ok().map(|p| p.join(".habit_sync")),
    ];

    for candidate in candidates.iter().flatten() {
        if is_writable_dir(candidate) {
            return Ok(candidate.clone());
        }
    }

    let temp_path = std::env::temp_dir().join("habit_sync");
    std::fs::create_dir_all(&temp_path)?;
    tracing::warn!("Using temporary directory for habit data: {}", temp_path.display());
    Ok(temp_path)
}

fn is_writable_dir(path: &Path) -> bool {
    if std::fs::create_dir_all(path).is_err() {
        return false;
    }
    let probe = path.join(".test_write");
    let writable = std::fs::write(&probe, "test").is_ok();
    let _ = std::fs::remove_file(&probe);
    writable
}
