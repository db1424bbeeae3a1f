/// Storage layer for persisting the habit list
///
/// This module defines the persistence contract the store depends on and
/// the adapters that satisfy it: a JSON file, SQLite, and an in-memory
/// backend that can push updates to subscribers.

pub mod codec;
pub mod json_file;
pub mod memory;
pub mod migrations;
pub mod sqlite;

// Re-export the main storage types
pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use crate::domain::HabitRecord;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode habits: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid habit record {id}: {reason}")]
    InvalidRecord { id: i64, reason: String },

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Background storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Live feed closed: {0}")]
    FeedClosed(String),
}

impl StorageError {
    /// Whether the failure came from the persisted data rather than the medium
    pub fn is_decode(&self) -> bool {
        matches!(self, StorageError::Decode(_) | StorageError::InvalidRecord { .. })
    }
}

/// One update pushed by a live backend: the full list, or the error that ended the feed
pub type FeedItem = Result<Vec<HabitRecord>, StorageError>;

/// Receiving half of a backend's live feed
///
/// Dropping the feed releases the subscription; backends notice the closed
/// channel and stop pushing to it.
#[derive(Debug)]
pub struct BackendFeed {
    rx: mpsc::UnboundedReceiver<FeedItem>,
}

impl BackendFeed {
    /// Create a connected sender/feed pair
    pub fn channel() -> (mpsc::UnboundedSender<FeedItem>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next update; `None` once the backend dropped its side
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }
}

/// Persistence contract for the habit list
///
/// Backends store the whole list at once: `save_all` replaces whatever was
/// stored before, and `load` returns the last list saved. Push-capable
/// backends also override `subscribe`.
#[async_trait]
pub trait HabitBackend: Send + Sync {
    /// Read the stored list; an absent store yields an empty list
    async fn load(&self) -> Result<Vec<HabitRecord>, StorageError>;

    /// Replace the stored list with `records`
    async fn save_all(&self, records: &[HabitRecord]) -> Result<(), StorageError>;

    /// Open a live feed of the stored list, if the backend can push updates
    fn subscribe(&self) -> Result<Option<BackendFeed>, StorageError> {
        Ok(None)
    }

    /// Short name used in log lines
    fn describe(&self) -> String;
}
