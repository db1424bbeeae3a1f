/// Persistence contract tests shared by every backend
use std::sync::Arc;

use chrono::NaiveDate;
use habit_sync::*;
use tempfile::tempdir;

fn sample_records() -> Vec<HabitRecord> {
    let mut water = HabitRecord::new(HabitId(1), "Water", "8 glasses", 8).unwrap();
    water.completed_today = 3;
    water.weekly_completions = WeeklyCompletions::new([1, 0, 2, 0, 1, 0, 0]);

    let untouched = HabitRecord::new(HabitId(2), "Journal", "", 1).unwrap();

    let mut over = HabitRecord::new(HabitId(3), "Push-ups", "sets", 2).unwrap();
    over.completed_today = 5;
    over.recorded_today = true;

    vec![water, untouched, over]
}

fn sorted(mut records: Vec<HabitRecord>) -> Vec<HabitRecord> {
    records.sort_by_key(|r| r.id);
    records
}

async fn assert_round_trip(backend: &dyn HabitBackend) {
    let records = sample_records();
    backend.save_all(&records).await.unwrap();
    assert_eq!(sorted(backend.load().await.unwrap()), sorted(records));

    // All-zero histories survive too
    let zeroed = vec![HabitRecord::new(HabitId(9), "Floss", "", 1).unwrap()];
    backend.save_all(&zeroed).await.unwrap();
    assert_eq!(backend.load().await.unwrap(), zeroed);
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()))
}

#[cfg(test)]
mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_json_file_round_trip() {
        let dir = tempdir().unwrap();
        assert_round_trip(&JsonFileBackend::new(dir.path().join("habits.json"))).await;
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let dir = tempdir().unwrap();
        assert_round_trip(&SqliteBackend::new(dir.path().join("habits.db")).unwrap()).await;
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        assert_round_trip(&MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn test_missing_weekly_history_loads_with_zeros() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("habits.json");
        std::fs::write(
            &path,
            r#"[{"id":17,"name":"Walk","description":"","targetPerDay":1,"completedToday":0}]"#,
        )
        .unwrap();

        let records = JsonFileBackend::new(path).load().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].weekly_completions.as_array(), &[0; 7]);
    }

    #[tokio::test]
    async fn test_corrupt_data_falls_back_to_empty_store() {
        let backend = Arc::new(MemoryBackend::new().with_json("[{\"id\": oops"));

        let store = HabitStore::open(backend.clone(), clock()).await;

        assert!(store.list().is_empty());
        assert!(store.status().last_error.is_some());

        // The store keeps working and the next save replaces the bad data
        store.add("Fresh start", "", 1).unwrap();
        let status = store.flush().await.unwrap();
        assert!(status.is_persisted(1));
        assert_eq!(backend.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_writes_reach_backend_in_order() {
        let backend = Arc::new(MemoryBackend::new());
        let store = HabitStore::open(backend.clone(), clock()).await;

        let habit = store.add("Water", "", 10).unwrap();
        for _ in 0..25 {
            store.increment(habit.id).unwrap();
        }
        store.decrement(habit.id).unwrap();

        let status = store.flush().await.unwrap();
        assert!(status.is_persisted(store.version()));

        let stored = backend.load().await.unwrap();
        assert_eq!(stored, store.list());
        assert_eq!(stored[0].completed_today, 24);
        // Passing 10 on the way up counted the day once
        assert_eq!(stored[0].weekly_completions.total(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("habits.json");
        let store = HabitStore::open(Arc::new(JsonFileBackend::new(&path)), clock()).await;

        let a = store.add("A", "", 1).unwrap();
        store.add("B", "", 1).unwrap();
        store.delete(a.id).unwrap();
        store.shutdown().await;

        let stored = JsonFileBackend::new(&path).load().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "B");
    }

    #[tokio::test]
    async fn test_ids_continue_after_reload() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(SqliteBackend::new(dir.path().join("habits.db")).unwrap());

        let store = HabitStore::open(backend.clone(), clock()).await;
        let first = store.add("First", "", 1).unwrap();
        store.shutdown().await;

        let store = HabitStore::open(backend, clock()).await;
        let second = store.add("Second", "", 1).unwrap();

        assert!(second.id > first.id);
        assert_eq!(store.list().len(), 2);
        store.shutdown().await;
    }
}
