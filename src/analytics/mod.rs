/// Progress statistics over a habit snapshot
///
/// This module turns a snapshot into per-habit progress figures and an
/// overall summary, the numbers a stats view shows next to each habit.

use serde::Serialize;
use crate::domain::{HabitId, HabitRecord};

/// Today's progress and weekly total for one habit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitStats {
    pub id: HabitId,
    pub name: String,
    pub completed_today: u32,
    pub target_per_day: u32,
    /// Progress as a whole percentage, truncated (150 when over-completed)
    pub progress_percent: u32,
    /// Days in the trailing window on which the target was reached
    pub weekly_total: u64,
}

impl HabitStats {
    pub fn for_habit(habit: &HabitRecord) -> Self {
        Self {
            id: habit.id,
            name: habit.name.clone(),
            completed_today: habit.completed_today,
            target_per_day: habit.target_per_day,
            progress_percent: (habit.progress() * 100.0) as u32,
            weekly_total: habit.weekly_completions.total(),
        }
    }
}

/// Summary across every habit in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total_habits: usize,
    pub done_today: usize,
    /// Mean of each habit's progress, capped at 1.0 per habit
    pub avg_progress: f64,
    pub habits: Vec<HabitStats>,
}

/// Compute statistics for a snapshot, keeping its order
pub fn summarize(habits: &[HabitRecord]) -> StatsSummary {
    let stats: Vec<HabitStats> = habits.iter().map(HabitStats::for_habit).collect();

    let done_today = habits.iter().filter(|h| h.is_done_today()).count();
    let avg_progress = if habits.is_empty() {
        0.0
    } else {
        habits.iter().map(|h| h.progress().min(1.0)).sum::<f64>() / habits.len() as f64
    };

    StatsSummary {
        total_habits: habits.len(),
        done_today,
        avg_progress,
        habits: stats,
    }
}
