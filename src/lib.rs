/// Public library interface for the habit sync engine
///
/// This module exports the reactive habit store, the persistence backends
/// it writes through to, and the session object that ties them to the
/// once-per-day rollover.

use std::sync::Arc;
use thiserror::Error;

// Internal modules
mod domain;
mod storage;
mod store;
mod analytics;

pub mod clock;
pub mod commands;
pub mod config;
pub mod rollover;

// Re-export public modules and types
pub use domain::*;
pub use storage::{
    codec, BackendFeed, FeedItem, HabitBackend, JsonFileBackend, MemoryBackend, SqliteBackend,
    StorageError,
};
pub use store::{HabitStore, PersistStatus, Snapshot, SnapshotStream, StoreError};
pub use analytics::{summarize, HabitStats, StatsSummary};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BackendKind, TrackerConfig};
pub use rollover::{rollover_if_new_day, DayMarker};

/// Errors that can occur while running a tracker session
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One tracker session: a habit store plus its day-transition bookkeeping
///
/// Opening a session loads the habits and, when the calendar day changed
/// since the last session, rolls the weekly history over exactly once.
pub struct HabitTracker {
    store: HabitStore,
    marker: DayMarker,
    clock: Arc<dyn Clock>,
}

impl HabitTracker {
    /// Open a session for the configured data directory and backend
    pub async fn open(config: &TrackerConfig) -> Result<Self, TrackerError> {
        tracing::info!(
            "Opening habit tracker in {} ({:?} backend)",
            config.data_dir.display(),
            config.backend
        );

        let backend = config.open_backend()?;
        let marker = DayMarker::new(config.marker_path());
        Self::with_backend(backend, marker, Arc::new(SystemClock)).await
    }

    /// Open a session on an explicit backend, marker and clock
    pub async fn with_backend(
        backend: Arc<dyn HabitBackend>,
        marker: DayMarker,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TrackerError> {
        let store = HabitStore::open(backend, Arc::clone(&clock)).await;
        rollover_if_new_day(&store, &marker, clock.today()).await?;

        Ok(Self { store, marker, clock })
    }

    /// Roll over if the day changed while the session was open
    pub async fn check_day(&self) -> Result<bool, TrackerError> {
        Ok(rollover_if_new_day(&self.store, &self.marker, self.clock.today()).await?)
    }

    /// Get a reference to the habit store
    pub fn store(&self) -> &HabitStore {
        &self.store
    }

    /// Flush queued writes and stop the store
    pub async fn shutdown(self) {
        self.store.shutdown().await;
    }
}
