/// The in-process source of truth for habits
///
/// `HabitStore` keeps the authoritative list in memory, publishes a new
/// immutable snapshot after every mutation, and hands each snapshot to a
/// single background writer that saves it to the backend in order.
///
/// Mutations are applied synchronously under one lock, so two callers can
/// never interleave on the same record. Readers only ever see complete
/// snapshots and never take that lock.

mod feed;
mod writer;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use chrono::{Datelike, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::domain::{DomainError, HabitId, HabitRecord};
use crate::storage::HabitBackend;
use writer::WriteCommand;

/// An immutable, complete copy of the habit list
pub type Snapshot = Arc<Vec<HabitRecord>>;

/// Stream of snapshots, starting with the one current at subscription time
pub type SnapshotStream = BoxStream<'static, Snapshot>;

/// Most backend states remembered for recognising echoes and stale pushes
const MAX_KNOWN_STATES: usize = 32;

/// Errors returned synchronously by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] DomainError),

    #[error("Habit not found: {id}")]
    NotFound { id: HabitId },

    #[error("Habit store is closed")]
    Closed,
}

/// Progress of background persistence
///
/// Persistence failures never undo an in-memory mutation; they show up
/// here instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistStatus {
    /// Highest snapshot version the writer has finished with, saved or not
    pub settled_version: u64,
    /// Highest snapshot version known to be stored
    pub persisted_version: u64,
    /// Most recent load, save or feed failure; cleared by the next successful save
    pub last_error: Option<String>,
    /// Set once the writer has exited; nothing queued after that is saved
    pub writer_stopped: bool,
}

impl PersistStatus {
    /// Whether everything up to `version` reached the backend
    pub fn is_persisted(&self, version: u64) -> bool {
        self.persisted_version >= version
    }
}

struct StoreState {
    records: Snapshot,
    version: u64,
    next_id: i64,
}

impl StoreState {
    /// Copy-on-write access: clones the list only while a snapshot still shares it
    fn records_mut(&mut self) -> &mut Vec<HabitRecord> {
        Arc::make_mut(&mut self.records)
    }

    fn position(&self, id: HabitId) -> Result<usize, StoreError> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound { id })
    }
}

/// Outcome of applying a list pushed by a live backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteUpdate {
    /// A list the backend already held: our own save coming back, or a stale push
    Known,
    /// A local write is still queued and will overwrite the backend
    Pending,
    Unchanged,
    Applied,
}

/// State shared with the writer and feed tasks
pub(crate) struct Shared {
    state: Mutex<StoreState>,
    snapshots: watch::Sender<Snapshot>,
    status: watch::Sender<PersistStatus>,
    /// Lists the backend is known to have held, oldest first
    known: Mutex<VecDeque<Snapshot>>,
    live: bool,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_known(&self) -> MutexGuard<'_, VecDeque<Snapshot>> {
        self.known.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remember a list the backend holds or is about to hold
    ///
    /// Called with the loaded list and with every snapshot just before it
    /// is saved, so a feed can tell those apart from changes made elsewhere.
    pub(crate) fn remember_state(&self, snapshot: &Snapshot) {
        if !self.live {
            return;
        }
        let mut known = self.lock_known();
        if known.len() == MAX_KNOWN_STATES {
            known.pop_front();
        }
        known.push_back(Arc::clone(snapshot));
    }

    /// Drop a snapshot whose save failed
    pub(crate) fn forget_state(&self, snapshot: &Snapshot) {
        self.lock_known().retain(|s| !Arc::ptr_eq(s, snapshot));
    }

    fn is_known_state(&self, records: &[HabitRecord]) -> bool {
        self.lock_known().iter().any(|s| s.as_slice() == records)
    }

    pub(crate) fn report_error(&self, message: String) {
        self.status.send_modify(|status| status.last_error = Some(message));
    }

    /// Replace the list with one pushed by the backend
    ///
    /// A push equal to a list the backend already held is either our own
    /// save or older than it, and is ignored. Local writes win: while one
    /// is queued the pushed list is ignored, since the queued write will
    /// replace it in storage anyway.
    pub(crate) fn apply_remote(&self, records: Vec<HabitRecord>) -> RemoteUpdate {
        if self.is_known_state(&records) {
            return RemoteUpdate::Known;
        }

        let mut state = self.lock_state();
        if state.version > self.status.borrow().settled_version {
            return RemoteUpdate::Pending;
        }
        if state.records.as_slice() == records.as_slice() {
            return RemoteUpdate::Unchanged;
        }

        let after_max = records.iter().map(|r| r.id.value()).max().map_or(1, |max| max.saturating_add(1));
        state.next_id = state.next_id.max(after_max);
        state.records = Arc::new(records);
        self.remember_state(&state.records);
        self.snapshots.send_replace(Arc::clone(&state.records));
        RemoteUpdate::Applied
    }
}

/// Reactive, write-through store of habit records
///
/// Construct one per session with [`HabitStore::open`] and end it with
/// [`HabitStore::shutdown`] so queued writes are flushed.
pub struct HabitStore {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<WriteCommand>,
    writer: Option<JoinHandle<()>>,
    feed: Option<JoinHandle<()>>,
    clock: Arc<dyn Clock>,
}

impl HabitStore {
    /// Load the persisted list and start the background writer
    ///
    /// A failed load is logged and reported through [`PersistStatus`]; the
    /// store then starts from an empty list. Push-capable backends are
    /// subscribed to so that changes made elsewhere reach this store.
    pub async fn open(backend: Arc<dyn HabitBackend>, clock: Arc<dyn Clock>) -> Self {
        let label = backend.describe();

        let (records, load_error) = match backend.load().await {
            Ok(records) => {
                info!("Loaded {} habits from {}", records.len(), label);
                (records, None)
            }
            Err(e) => {
                error!("Failed to load habits from {}: {}; starting with an empty list", label, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let next_id = initial_next_id(&records);
        let records: Snapshot = Arc::new(records);
        let (snapshots, _) = watch::channel(Arc::clone(&records));
        let (status, _) = watch::channel(PersistStatus {
            last_error: load_error,
            ..PersistStatus::default()
        });

        let feed = match backend.subscribe() {
            Ok(feed) => feed,
            Err(e) => {
                warn!("Could not subscribe to {}: {}", label, e);
                None
            }
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(StoreState { records: Arc::clone(&records), version: 0, next_id }),
            snapshots,
            status,
            known: Mutex::new(VecDeque::new()),
            live: feed.is_some(),
        });
        // The feed opens with the list as stored, which must not count as a remote change
        shared.remember_state(&records);

        let (queue, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(writer::run(Arc::clone(&backend), Arc::clone(&shared), rx));
        let feed = feed.map(|feed| {
            debug!("Following live updates from {}", label);
            tokio::spawn(feed::run(backend, Arc::clone(&shared), feed))
        });

        Self {
            shared,
            queue,
            writer: Some(writer),
            feed,
            clock,
        }
    }

    /// Current habit list
    pub fn list(&self) -> Vec<HabitRecord> {
        self.snapshot().as_ref().clone()
    }

    /// Current snapshot, shared rather than copied
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Look up one habit in the current snapshot
    pub fn get(&self, id: HabitId) -> Option<HabitRecord> {
        self.snapshot().iter().find(|r| r.id == id).cloned()
    }

    /// Follow the habit list
    ///
    /// The stream yields the current snapshot first and then one snapshot
    /// per change, in order. A slow subscriber skips straight to the newest
    /// snapshot rather than queueing stale ones. Each call starts a fresh
    /// stream; it ends when the store shuts down.
    pub fn subscribe(&self) -> SnapshotStream {
        let rx = self.shared.snapshots.subscribe();
        let current = rx.borrow().clone();

        let updates = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, rx))
        });

        stream::once(async move { current }).chain(updates).boxed()
    }

    /// Latest persistence status
    pub fn status(&self) -> PersistStatus {
        self.shared.status.borrow().clone()
    }

    /// Follow persistence status changes
    pub fn status_updates(&self) -> watch::Receiver<PersistStatus> {
        self.shared.status.subscribe()
    }

    /// Version of the latest snapshot produced by a local mutation
    pub fn version(&self) -> u64 {
        self.shared.lock_state().version
    }

    /// Add a habit with zeroed counters and history
    pub fn add(&self, name: &str, description: &str, target_per_day: i64) -> Result<HabitRecord, StoreError> {
        let record = self.commit(|state| {
            // The id is only consumed once the input passed validation
            let record = HabitRecord::new(HabitId(state.next_id), name, description, target_per_day)?;
            state.next_id += 1;
            state.records_mut().push(record.clone());
            Ok(record)
        })?;

        debug!("Added habit '{}' ({})", record.name, record.id);
        Ok(record)
    }

    /// Set today's completion count for a habit
    ///
    /// Negative counts clamp to zero and there is no upper clamp. Landing
    /// exactly on the target counts the day in the weekly window, at most
    /// once per day.
    pub fn update_completion(&self, id: HabitId, new_count: i64) -> Result<HabitRecord, StoreError> {
        self.change_count(id, |_| new_count)
    }

    /// One more completion today
    pub fn increment(&self, id: HabitId) -> Result<HabitRecord, StoreError> {
        self.change_count(id, |current| current + 1)
    }

    /// One fewer completion today, never below zero
    pub fn decrement(&self, id: HabitId) -> Result<HabitRecord, StoreError> {
        self.change_count(id, |current| current - 1)
    }

    /// Compute the new count from the current one while the state lock is held
    fn change_count(
        &self,
        id: HabitId,
        new_count: impl FnOnce(i64) -> i64,
    ) -> Result<HabitRecord, StoreError> {
        let today = self.clock.today().weekday();

        let (record, reached) = self.commit(|state| {
            let index = state.position(id)?;
            let record = &mut state.records_mut()[index];
            let count = new_count(i64::from(record.completed_today));
            let reached = record.apply_completion(count, today);
            Ok((record.clone(), reached))
        })?;

        debug!("Habit {} completed {} of {} today", id, record.completed_today, record.target_per_day);
        if reached {
            info!("Habit '{}' ({}) reached its daily target", record.name, id);
        }
        Ok(record)
    }

    /// Remove a habit
    pub fn delete(&self, id: HabitId) -> Result<HabitRecord, StoreError> {
        let removed = self.commit(|state| {
            let index = state.position(id)?;
            Ok(state.records_mut().remove(index))
        })?;

        debug!("Deleted habit '{}' ({})", removed.name, id);
        Ok(removed)
    }

    /// Count today as a completed day in the habit's weekly window
    pub fn record_daily_completion(&self, id: HabitId) -> Result<HabitRecord, StoreError> {
        let today = self.clock.today().weekday();

        self.commit(|state| {
            let index = state.position(id)?;
            let record = &mut state.records_mut()[index];
            record.record_daily_completion(today);
            Ok(record.clone())
        })
    }

    /// Shift every weekly window by one day and reset today's counters
    ///
    /// Calling this twice on the same day drops two days of history; use
    /// [`crate::rollover::rollover_if_new_day`] to guard it.
    pub fn rollover_for_new_day(&self) -> usize {
        let rolled = self
            .commit(|state| {
                let records = state.records_mut();
                records.iter_mut().for_each(HabitRecord::roll_over);
                Ok(records.len())
            })
            .unwrap_or(0);

        info!("Rolled over {} habits for a new day", rolled);
        rolled
    }

    /// Today's progress fraction for a habit
    pub fn progress(&self, id: HabitId) -> Result<f64, StoreError> {
        self.get(id)
            .map(|r| r.progress())
            .ok_or(StoreError::NotFound { id })
    }

    /// Wait until every mutation made so far has been handled by the writer
    ///
    /// Returns the status at that point; check `last_error` or
    /// [`PersistStatus::is_persisted`] to see whether the write succeeded.
    /// Fails with [`StoreError::Closed`] if the writer stopped first.
    pub async fn flush(&self) -> Result<PersistStatus, StoreError> {
        let target = self.version();
        let mut rx = self.shared.status.subscribe();

        let status = rx
            .wait_for(|status| status.settled_version >= target || status.writer_stopped)
            .await
            .map_err(|_| StoreError::Closed)?
            .clone();

        if status.settled_version < target {
            return Err(StoreError::Closed);
        }
        Ok(status)
    }

    /// Stop following the backend, flush queued writes, and stop the writer
    pub async fn shutdown(mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
            let _ = feed.await;
        }

        let _ = self.queue.send(WriteCommand::Shutdown);
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                error!("Persistence writer ended abnormally: {}", e);
            }
        }

        info!("Habit store closed at version {}", self.version());
    }

    /// Apply one mutation, publish the new snapshot and queue it for saving
    ///
    /// A failing mutation leaves the list, the version and the queue untouched.
    fn commit<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.shared.lock_state();
        let value = apply(&mut state)?;

        state.version += 1;
        let version = state.version;
        let snapshot = Arc::clone(&state.records);
        self.shared.snapshots.send_replace(Arc::clone(&snapshot));

        if self.queue.send(WriteCommand::Persist { version, records: snapshot }).is_err() {
            warn!("Persistence writer has stopped; snapshot v{} will not be saved", version);
        }
        Ok(value)
    }
}

impl Drop for HabitStore {
    fn drop(&mut self) {
        // The writer drains its queue on its own once the sender is gone
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

/// First id handed out in this session
///
/// Starts after every loaded id and no earlier than the current time in
/// milliseconds, then only counts up, so ids are never reused.
fn initial_next_id(records: &[HabitRecord]) -> i64 {
    let after_loaded = records
        .iter()
        .map(|r| r.id.value())
        .max()
        .map_or(1, |max| max.saturating_add(1));
    after_loaded.max(Utc::now().timestamp_millis())
}
