/// Stores following a push-capable backend
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use habit_sync::*;

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()))
}

/// Poll until `check` holds, failing the test after two seconds
async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[cfg(test)]
mod live_feed_tests {
    use super::*;

    #[tokio::test]
    async fn test_external_update_reaches_store() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;

        let remote = vec![HabitRecord::new(HabitId(500), "Remote", "", 2).unwrap()];
        backend.publish(&remote).unwrap();

        eventually(|| store.list() == remote).await;

        // New local ids stay clear of the pushed ones
        let local = store.add("Local", "", 1).unwrap();
        assert!(local.id > HabitId(500));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_own_writes_are_not_reapplied() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;

        let habit = store.add("Water", "", 5).unwrap();
        for _ in 0..5 {
            store.increment(habit.id).unwrap();
        }
        store.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let current = store.get(habit.id).unwrap();
        assert_eq!(current.completed_today, 5);
        assert_eq!(current.weekly_completions.total(), 1);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_saved_habit_survives_the_initial_push() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;

        let habit = store.add("Water", "", 5).unwrap();
        store.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.get(habit.id).is_some());
        assert_eq!(backend.load().await.unwrap(), store.list());
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_change_after_settled_save_is_applied() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;

        let habit = store.add("Water", "", 5).unwrap();
        store.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut remote = store.list();
        remote[0].completed_today = 3;
        backend.publish(&remote).unwrap();

        eventually(|| store.get(habit.id).map_or(false, |h| h.completed_today == 3)).await;

        // The next local change builds on the pushed state
        let after = store.increment(habit.id).unwrap();
        assert_eq!(after.completed_today, 4);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_broken_feed_is_resubscribed() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;
        eventually(|| backend.listener_count() == 1).await;

        backend.break_feeds("connection reset");
        eventually(|| backend.listener_count() == 1).await;

        let remote = vec![HabitRecord::new(HabitId(7), "After reconnect", "", 1).unwrap()];
        backend.publish(&remote).unwrap();
        eventually(|| store.list() == remote).await;
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_feed_failure_is_reported() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;

        backend.set_fail_subscribe(true);
        backend.break_feeds("server gone");

        eventually(|| {
            store
                .status()
                .last_error
                .map_or(false, |e| e.contains("Live feed closed"))
        })
        .await;

        // Local mutations keep working without the feed
        store.add("Offline", "", 1).unwrap();
        assert_eq!(store.list().len(), 1);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_subscription() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;
        assert_eq!(backend.listener_count(), 1);

        store.shutdown().await;

        assert_eq!(backend.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let backend = Arc::new(MemoryBackend::live());
        let store = HabitStore::open(backend.clone(), clock()).await;

        drop(store);

        eventually(|| backend.listener_count() == 0).await;
    }
}
