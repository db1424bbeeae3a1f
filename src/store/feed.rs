/// Follows a push-capable backend and folds its updates into the store
///
/// A feed that ends, with or without an error, is re-opened a few times
/// with a growing delay before the failure is reported through the
/// persistence status.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::storage::{BackendFeed, HabitBackend, StorageError};
use crate::store::{RemoteUpdate, Shared};

/// Re-subscribe attempts before giving up on the live feed
const MAX_RESUBSCRIBE: u32 = 3;

/// Delay before the first re-subscribe attempt; doubles each time
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_millis(50);

pub(crate) async fn run(backend: Arc<dyn HabitBackend>, shared: Arc<Shared>, mut feed: BackendFeed) {
    let label = backend.describe();

    loop {
        let reason = follow(&shared, &mut feed).await;
        warn!("Live feed from {} ended: {}", label, reason);

        match resubscribe(backend.as_ref(), &label).await {
            Some(next) => feed = next,
            None => {
                let err = StorageError::FeedClosed(reason);
                shared.report_error(err.to_string());
                return;
            }
        }
    }
}

/// Apply updates until the feed ends; returns why it ended
async fn follow(shared: &Shared, feed: &mut BackendFeed) -> String {
    loop {
        match feed.next().await {
            Some(Ok(records)) => match shared.apply_remote(records) {
                RemoteUpdate::Applied => info!("Applied habit list pushed by the backend"),
                other => debug!("Ignored pushed habit list ({:?})", other),
            },
            Some(Err(e)) => return e.to_string(),
            None => return "stream closed".to_string(),
        }
    }
}

async fn resubscribe(backend: &dyn HabitBackend, label: &str) -> Option<BackendFeed> {
    let mut delay = RESUBSCRIBE_BACKOFF;

    for attempt in 1..=MAX_RESUBSCRIBE {
        tokio::time::sleep(delay).await;
        delay *= 2;

        match backend.subscribe() {
            Ok(Some(feed)) => {
                info!("Re-subscribed to {} (attempt {})", label, attempt);
                return Some(feed);
            }
            Ok(None) => return None,
            Err(e) => warn!("Re-subscribe to {} failed (attempt {}): {}", label, attempt, e),
        }
    }

    None
}
