/// Basic unit tests to verify core functionality
use chrono::{NaiveDate, Weekday};
use habit_sync::*;

#[cfg(test)]
mod basic_unit_tests {
    use super::*;

    #[test]
    fn test_habit_creation() {
        let habit = HabitRecord::new(HabitId(1), "  Test Habit ", "A test habit", 3);

        assert!(habit.is_ok());
        let habit = habit.unwrap();
        assert_eq!(habit.name, "Test Habit");
        assert_eq!(habit.completed_today, 0);
        assert_eq!(habit.weekly_completions.total(), 0);
    }

    #[test]
    fn test_habit_validation() {
        assert!(HabitRecord::new(HabitId(1), "", "", 1).is_err());
        assert!(HabitRecord::new(HabitId(1), &"x".repeat(101), "", 1).is_err());
        assert!(HabitRecord::new(HabitId(1), "Run", &"x".repeat(501), 1).is_err());
        assert!(matches!(
            HabitRecord::new(HabitId(1), "Run", "", 0),
            Err(DomainError::InvalidTarget { value: 0 })
        ));
    }

    #[test]
    fn test_completion_lands_on_weekday_slot() {
        let mut habit = HabitRecord::new(HabitId(1), "Read", "", 2).unwrap();

        assert!(!habit.apply_completion(1, Weekday::Sun));
        assert!(habit.apply_completion(2, Weekday::Sun));
        // Going past the target and back does not count the day again
        assert!(!habit.apply_completion(3, Weekday::Sun));
        assert!(!habit.apply_completion(2, Weekday::Sun));

        assert_eq!(habit.weekly_completions.as_array(), &[0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(habit.progress(), 1.0);
    }

    #[test]
    fn test_weekday_index_starts_on_monday() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();

        assert_eq!(weekday_index(monday), 0);
        assert_eq!(weekday_index(sunday), 6);
    }

    #[test]
    fn test_decode_rejects_bad_history() {
        let short = r#"[{"id":1,"name":"A","description":"","targetPerDay":1,
            "completedToday":0,"weeklyCompletions":[1,2,3]}]"#;
        let negative = r#"[{"id":1,"name":"A","description":"","targetPerDay":1,
            "completedToday":-2,"weeklyCompletions":[0,0,0,0,0,0,0]}]"#;

        assert!(codec::decode(short).is_err());
        assert!(codec::decode(negative).is_err());
    }

    #[test]
    fn test_decode_rejects_duplicate_ids() {
        let twice = r#"[{"id":4,"name":"A","description":"","targetPerDay":1,"completedToday":0},
            {"id":4,"name":"B","description":"","targetPerDay":1,"completedToday":0}]"#;

        assert!(codec::decode(twice).is_err());
    }

    #[test]
    fn test_encode_uses_camel_case_fields() {
        let habit = HabitRecord::new(HabitId(42), "Water", "", 8).unwrap();
        let json = codec::encode(&[habit]).unwrap();

        assert!(json.contains("\"targetPerDay\":8"));
        assert!(json.contains("\"weeklyCompletions\":[0,0,0,0,0,0,0]"));
    }

    #[test]
    fn test_stats_summary() {
        let mut done = HabitRecord::new(HabitId(1), "Done", "", 2).unwrap();
        done.completed_today = 4;
        let half = {
            let mut h = HabitRecord::new(HabitId(2), "Half", "", 2).unwrap();
            h.completed_today = 1;
            h
        };

        let summary = summarize(&[done, half]);

        assert_eq!(summary.total_habits, 2);
        assert_eq!(summary.done_today, 1);
        assert_eq!(summary.avg_progress, 0.75);
        assert_eq!(summary.habits[0].progress_percent, 200);
    }

    #[test]
    fn test_config_paths_follow_backend() {
        let json = TrackerConfig::new("/tmp/habits", BackendKind::Json);
        let sqlite = TrackerConfig::new("/tmp/habits", BackendKind::Sqlite);

        assert!(json.habits_path().ends_with("habits.json"));
        assert!(sqlite.habits_path().ends_with("habits.db"));
        assert_eq!(json.marker_path(), sqlite.marker_path());
    }
}

#[cfg(test)]
mod store_unit_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_commands_drive_the_store() {
        tokio_test::block_on(async {
            let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()));
            let store = HabitStore::open(Arc::new(MemoryBackend::new()), clock).await;

            let added = commands::execute(
                &store,
                &commands::Command::Add {
                    name: "Stretch".to_string(),
                    target: 2,
                    description: String::new(),
                },
            )
            .unwrap();
            assert!(added.starts_with("Added habit 'Stretch'"));

            let id = store.list()[0].id.value();
            commands::execute(&store, &commands::Command::Set { id, count: 2 }).unwrap();
            let listing = commands::execute(&store, &commands::Command::List).unwrap();
            assert!(listing.contains("2 / 2 today (done)"));

            let missing = commands::execute(&store, &commands::Command::Delete { id: id + 1 });
            assert!(matches!(missing, Err(StoreError::NotFound { .. })));

            store.shutdown().await;
        });
    }
}
