/// Once-per-day rollover guard
///
/// The store shifts history whenever it is asked to, so the decision of
/// whether a new calendar day has started lives here. The date of the last
/// rollover is kept as a `YYYYMMDD` string in a small marker file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use chrono::NaiveDate;
use tokio::fs;

use crate::storage::StorageError;
use crate::store::HabitStore;

const DATE_FORMAT: &str = "%Y%m%d";

/// Persisted date of the last rollover
#[derive(Debug, Clone)]
pub struct DayMarker {
    path: PathBuf,
}

impl DayMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Date of the last rollover, if one was recorded
    ///
    /// An unreadable date is treated as missing so the next start-up rolls over.
    pub async fn read(&self) -> Result<Option<NaiveDate>, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        match NaiveDate::parse_from_str(content.trim(), DATE_FORMAT) {
            Ok(date) => Ok(Some(date)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable rollover marker {:?}: {}", content.trim(), e);
                Ok(None)
            }
        }
    }

    pub async fn write(&self, date: NaiveDate) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }
        fs::write(&self.path, date.format(DATE_FORMAT).to_string()).await?;
        Ok(())
    }
}

/// Roll the store over if `today` is later than the recorded date
///
/// Returns whether a rollover happened. A date earlier than the marker
/// (clock moved back) leaves both the store and the marker alone. The
/// rolled-over list is flushed before the marker moves.
pub async fn rollover_if_new_day(
    store: &HabitStore,
    marker: &DayMarker,
    today: NaiveDate,
) -> Result<bool, StorageError> {
    let last = marker.read().await?;
    match last {
        Some(last) if last == today => {
            tracing::debug!("Already rolled over for {}", today);
            return Ok(false);
        }
        Some(last) if last > today => {
            tracing::warn!("Clock is behind the last rollover ({} < {}); not rolling over", today, last);
            return Ok(false);
        }
        _ => {}
    }

    let rolled = store.rollover_for_new_day();
    if let Ok(status) = store.flush().await {
        if let Some(err) = status.last_error {
            tracing::warn!("Rolled-over habits not yet stored: {}", err);
        }
    }

    marker.write(today).await?;
    tracing::info!(
        "New day {} (last rollover: {}), rolled over {} habits",
        today,
        last.map_or_else(|| "never".to_string(), |d| d.to_string()),
        rolled
    );
    Ok(true)
}
