/// In-process habit backend
///
/// Holds the encoded list the same way a key-value preference store would:
/// one JSON string under one key. Live instances push every saved list to
/// their subscribers, which is how a document database with listeners
/// behaves. Failure switches let tests exercise the store's error paths.

use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::HabitRecord;
use crate::storage::{codec, BackendFeed, FeedItem, HabitBackend, StorageError};

#[derive(Default)]
struct MemoryState {
    blob: Option<String>,
    listeners: Vec<mpsc::UnboundedSender<FeedItem>>,
    fail_saves: bool,
    fail_subscribe: bool,
    save_count: usize,
}

/// Memory-backed storage, optionally push-capable
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    live: bool,
}

impl MemoryBackend {
    /// A pull-only backend
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that pushes every stored list to its subscribers
    pub fn live() -> Self {
        Self {
            live: true,
            ..Self::default()
        }
    }

    /// Seed the store with raw persisted JSON
    pub fn with_json(self, json: impl Into<String>) -> Self {
        self.lock().blob = Some(json.into());
        self
    }

    /// The JSON currently stored, if anything was saved
    pub fn raw_json(&self) -> Option<String> {
        self.lock().blob.clone()
    }

    /// Number of successful `save_all` calls
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Make subsequent saves fail with an IO error
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Make subsequent `subscribe` calls fail
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    /// Subscribers that are still connected
    pub fn listener_count(&self) -> usize {
        let mut state = self.lock();
        state.listeners.retain(|tx| !tx.is_closed());
        state.listeners.len()
    }

    /// Store a list written by some other process and push it to subscribers
    pub fn publish(&self, records: &[HabitRecord]) -> Result<(), StorageError> {
        let json = codec::encode(records)?;
        let mut state = self.lock();
        state.blob = Some(json);
        Self::notify(&mut state, records);
        Ok(())
    }

    /// End every open feed with an error, as a dropped connection would
    pub fn break_feeds(&self, reason: &str) {
        let mut state = self.lock();
        for tx in state.listeners.drain(..) {
            let _ = tx.send(Err(StorageError::FeedClosed(reason.to_string())));
        }
    }

    fn notify(state: &mut MemoryState, records: &[HabitRecord]) {
        state
            .listeners
            .retain(|tx| tx.send(Ok(records.to_vec())).is_ok());
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HabitBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<HabitRecord>, StorageError> {
        match self.raw_json() {
            Some(json) => codec::decode(&json),
            None => Ok(Vec::new()),
        }
    }

    async fn save_all(&self, records: &[HabitRecord]) -> Result<(), StorageError> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory backend rejected the write",
            )));
        }

        state.blob = Some(codec::encode(records)?);
        state.save_count += 1;
        if self.live {
            Self::notify(&mut state, records);
        }
        Ok(())
    }

    fn subscribe(&self) -> Result<Option<BackendFeed>, StorageError> {
        if !self.live {
            return Ok(None);
        }

        let mut state = self.lock();
        if state.fail_subscribe {
            return Err(StorageError::FeedClosed("subscription refused".to_string()));
        }

        let current = match &state.blob {
            Some(json) => codec::decode(json)?,
            None => Vec::new(),
        };

        let (tx, feed) = BackendFeed::channel();
        // The first push is the current list, as snapshot listeners do
        let _ = tx.send(Ok(current));
        state.listeners.push(tx);
        Ok(Some(feed))
    }

    fn describe(&self) -> String {
        if self.live { "memory(live)" } else { "memory" }.to_string()
    }
}
