/// Command-line operations on the habit store
///
/// Each command maps to one store operation and produces the text the
/// binary prints.

use clap::Subcommand;
use crate::analytics;
use crate::domain::{HabitId, HabitRecord};
use crate::store::{HabitStore, StoreError};

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show every habit with today's progress
    List,
    /// Add a new habit
    Add {
        /// Display name
        name: String,
        /// Completions that make a full day
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        target: i64,
        /// Optional free text
        #[arg(short = 'm', long, default_value = "")]
        description: String,
    },
    /// Set today's completion count
    Set {
        id: i64,
        #[arg(allow_negative_numbers = true)]
        count: i64,
    },
    /// Add one completion for today
    Inc { id: i64 },
    /// Remove one completion for today
    Dec { id: i64 },
    /// Delete a habit
    Delete { id: i64 },
    /// Show today's progress and the last 7 days
    Stats,
}

/// Run one command against the store and describe the result
pub fn execute(store: &HabitStore, command: &Command) -> Result<String, StoreError> {
    match command {
        Command::List => Ok(render_list(&store.list())),
        Command::Add { name, target, description } => {
            let habit = store.add(name, description, *target)?;
            Ok(format!("Added habit '{}' with id {}", habit.name, habit.id))
        }
        Command::Set { id, count } => {
            let habit = store.update_completion(HabitId(*id), *count)?;
            Ok(render_progress(&habit))
        }
        Command::Inc { id } => store.increment(HabitId(*id)).map(|h| render_progress(&h)),
        Command::Dec { id } => store.decrement(HabitId(*id)).map(|h| render_progress(&h)),
        Command::Delete { id } => {
            let habit = store.delete(HabitId(*id))?;
            Ok(format!("Deleted habit '{}'", habit.name))
        }
        Command::Stats => Ok(render_stats(&store.list())),
    }
}

fn render_progress(habit: &HabitRecord) -> String {
    let mark = if habit.is_done_today() { " (done)" } else { "" };
    format!(
        "{} [{}]: {} / {} today{}",
        habit.name, habit.id, habit.completed_today, habit.target_per_day, mark
    )
}

fn render_list(habits: &[HabitRecord]) -> String {
    if habits.is_empty() {
        return "No habits yet. Add one with `habit-sync add <name>`.".to_string();
    }

    habits
        .iter()
        .map(|h| {
            if h.description.is_empty() {
                render_progress(h)
            } else {
                format!("{}\n    {}", render_progress(h), h.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_stats(habits: &[HabitRecord]) -> String {
    let summary = analytics::summarize(habits);

    let mut lines = vec![format!(
        "{} of {} habits done today, average progress {:.0}%",
        summary.done_today,
        summary.total_habits,
        summary.avg_progress * 100.0
    )];

    for (stats, habit) in summary.habits.iter().zip(habits) {
        let week = habit
            .weekly_completions
            .as_array()
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!(
            "{} [{}]: {}% today, last 7 days [{}] = {}",
            stats.name, stats.id, stats.progress_percent, week, stats.weekly_total
        ));
    }

    lines.join("\n")
}
