/// Habit record and related functionality
///
/// This module defines the HabitRecord struct that the store hands out in
/// snapshots, along with validation and the per-day counter transitions.

use serde::{Deserialize, Serialize};
use chrono::Weekday;
use crate::domain::{DomainError, HabitId, WeeklyCompletions};
use crate::storage::codec::HabitDocument;

/// Longest accepted habit name, in characters
const MAX_NAME_LEN: usize = 100;

/// Longest accepted description, in characters
const MAX_DESCRIPTION_LEN: usize = 500;

/// A habit the user wants to complete a number of times per day
///
/// Records are immutable from the outside: the store owns the authoritative
/// copy and hands out clones inside snapshots. Serialization goes through
/// the versioned `HabitDocument` wire schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HabitDocument", into = "HabitDocument")]
pub struct HabitRecord {
    /// Unique identifier for this habit
    pub id: HabitId,
    /// Display name (e.g., "Drink water")
    pub name: String,
    /// Free text, may be empty
    pub description: String,
    /// How many completions make a full day
    pub target_per_day: u32,
    /// Completions counted so far today
    pub completed_today: u32,
    /// Totals for the trailing 7-day window
    pub weekly_completions: WeeklyCompletions,
    /// Whether today's completion has already been counted in the window
    pub recorded_today: bool,
}

impl HabitRecord {
    /// Create a new habit with validation
    ///
    /// Counters start at zero and the weekly window is empty. The target is
    /// taken as a signed value so that negative input is rejected here
    /// rather than wrapped by the caller.
    pub fn new(
        id: HabitId,
        name: &str,
        description: &str,
        target_per_day: i64,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name)?;
        Self::validate_description(description)?;
        let target_per_day = Self::validate_target(target_per_day)?;

        Ok(Self {
            id,
            name,
            description: description.to_string(),
            target_per_day,
            completed_today: 0,
            weekly_completions: WeeklyCompletions::zeroed(),
            recorded_today: false,
        })
    }

    /// Create a record from existing data (used when loading from storage)
    ///
    /// This constructor assumes the fields were already checked by the
    /// decoder and does not re-apply the add-time rules.
    pub fn from_existing(
        id: HabitId,
        name: String,
        description: String,
        target_per_day: u32,
        completed_today: u32,
        weekly_completions: WeeklyCompletions,
        recorded_today: bool,
    ) -> Self {
        Self {
            id,
            name,
            description,
            target_per_day,
            completed_today,
            weekly_completions,
            recorded_today,
        }
    }

    /// Fraction of today's target reached; 0 when the target is 0
    pub fn progress(&self) -> f64 {
        if self.target_per_day == 0 {
            return 0.0;
        }
        f64::from(self.completed_today) / f64::from(self.target_per_day)
    }

    /// Whether today's target is met or exceeded
    pub fn is_done_today(&self) -> bool {
        self.target_per_day > 0 && self.completed_today >= self.target_per_day
    }

    /// Set today's counter, clamping negative input to zero
    ///
    /// Returns true when this update landed exactly on the target for the
    /// first time today, in which case the completion has been added to the
    /// weekly window for `today`.
    pub fn apply_completion(&mut self, new_count: i64, today: Weekday) -> bool {
        self.completed_today = u32::try_from(new_count.max(0)).unwrap_or(u32::MAX);

        let reached_target = self.target_per_day > 0
            && self.completed_today == self.target_per_day
            && !self.recorded_today;

        if reached_target {
            self.record_daily_completion(today);
        }
        reached_target
    }

    /// Count one full day of completion in the slot for `today`
    pub fn record_daily_completion(&mut self, today: Weekday) {
        self.weekly_completions.record(today);
        self.recorded_today = true;
    }

    /// Shift the weekly window and start a fresh day
    pub fn roll_over(&mut self) {
        self.weekly_completions.rotate_for_new_day();
        self.completed_today = 0;
        self.recorded_today = false;
    }

    // Validation helper methods

    /// Validate habit name and return it trimmed
    fn validate_name(name: &str) -> Result<String, DomainError> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidHabitName(
                "Habit name cannot be empty".to_string()
            ));
        }

        if trimmed.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::InvalidHabitName(
                format!("Habit name cannot be longer than {} characters", MAX_NAME_LEN)
            ));
        }

        Ok(trimmed.to_string())
    }

    fn validate_description(description: &str) -> Result<(), DomainError> {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::InvalidValue {
                message: format!("Description cannot be longer than {} characters", MAX_DESCRIPTION_LEN)
            });
        }
        Ok(())
    }

    fn validate_target(target_per_day: i64) -> Result<u32, DomainError> {
        if target_per_day <= 0 {
            return Err(DomainError::InvalidTarget { value: target_per_day });
        }
        u32::try_from(target_per_day).map_err(|_| DomainError::InvalidValue {
            message: format!("Target per day is too large: {}", target_per_day)
        })
    }
}
