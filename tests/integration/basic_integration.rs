/// Basic integration tests: a tracker session end to end
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::StreamExt;
use habit_sync::*;
use tempfile::tempdir;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

async fn next_snapshot(stream: &mut SnapshotStream) -> Snapshot {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot stream ended")
}

#[cfg(test)]
mod basic_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_session_basic_workflow() {
        let dir = tempdir().unwrap();
        let config = TrackerConfig::new(dir.path(), BackendKind::Json);

        let tracker = HabitTracker::open(&config).await.expect("Failed to open tracker");
        let habit = tracker.store().add("Morning Run", "around the park", 1).unwrap();
        tracker.store().increment(habit.id).unwrap();
        tracker.shutdown().await;

        // A second session on the same directory sees the saved state
        let tracker = HabitTracker::open(&config).await.expect("Failed to reopen tracker");
        let habits = tracker.store().list();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].name, "Morning Run");
        tracker.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshot_stream_follows_mutations() {
        let store = HabitStore::open(Arc::new(MemoryBackend::new()), Arc::new(FixedClock::new(monday()))).await;
        let mut stream = store.subscribe();

        assert!(next_snapshot(&mut stream).await.is_empty());

        let habit = store.add("Read", "", 2).unwrap();
        let snapshot = next_snapshot(&mut stream).await;
        assert_eq!(snapshot.len(), 1);

        store.delete(habit.id).unwrap();
        let snapshot = next_snapshot(&mut stream).await;
        assert!(snapshot.iter().all(|h| h.id != habit.id));

        // A new subscriber starts from the current state
        let mut late = store.subscribe();
        assert!(next_snapshot(&mut late).await.is_empty());
    }

    #[tokio::test]
    async fn test_stream_ends_after_shutdown() {
        let store = HabitStore::open(Arc::new(MemoryBackend::new()), Arc::new(FixedClock::new(monday()))).await;
        let mut stream = store.subscribe();
        let _current = next_snapshot(&mut stream).await;

        store.shutdown().await;

        let end = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_rollover_runs_once_per_day() {
        let seeded = r#"[{"id":1,"name":"Water","description":"","targetPerDay":3,
            "completedToday":2,"weeklyCompletions":[1,2,3,4,5,6,7]}]"#;
        let backend = Arc::new(MemoryBackend::new().with_json(seeded));
        let dir = tempdir().unwrap();
        let marker = DayMarker::new(dir.path().join("last_rollover"));
        marker.write(monday()).await.unwrap();
        let clock = Arc::new(FixedClock::new(monday()));

        let tracker = HabitTracker::with_backend(backend.clone(), marker.clone(), clock.clone())
            .await
            .unwrap();
        assert_eq!(tracker.store().list()[0].completed_today, 2);
        assert!(!tracker.check_day().await.unwrap());

        clock.advance_days(1);
        assert!(tracker.check_day().await.unwrap());
        assert!(!tracker.check_day().await.unwrap());

        let habit = &tracker.store().list()[0];
        assert_eq!(habit.weekly_completions.as_array(), &[2, 3, 4, 5, 6, 7, 0]);
        assert_eq!(habit.completed_today, 0);
        assert_eq!(marker.read().await.unwrap(), Some(monday().succ_opt().unwrap()));
        tracker.shutdown().await;

        let stored = backend.load().await.unwrap();
        assert_eq!(stored[0].weekly_completions.as_array(), &[2, 3, 4, 5, 6, 7, 0]);
    }

    #[tokio::test]
    async fn test_first_session_rolls_over_and_writes_marker() {
        let dir = tempdir().unwrap();
        let marker = DayMarker::new(dir.path().join("last_rollover"));

        let tracker = HabitTracker::with_backend(
            Arc::new(MemoryBackend::new()),
            marker.clone(),
            Arc::new(FixedClock::new(monday())),
        )
        .await
        .unwrap();

        assert_eq!(marker.read().await.unwrap(), Some(monday()));
        assert!(!tracker.check_day().await.unwrap());
        tracker.shutdown().await;
    }
}
