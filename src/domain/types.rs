/// Core types used throughout the domain layer
///
/// This module defines the habit identifier and the fixed-size weekly
/// completion window that rolls forward once per calendar day.

use std::fmt;
use serde::{Deserialize, Serialize};
use chrono::{Datelike, NaiveDate, Weekday};
use crate::domain::DomainError;

/// Number of slots in the trailing completion window
pub const WINDOW_DAYS: usize = 7;

/// Unique identifier for a habit
///
/// A wrapper around the integer id persisted in the `id` field, so an id
/// can't be confused with a completion count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(pub i64);

impl HabitId {
    /// Raw integer value as stored on disk
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for HabitId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Slot index for a date, Monday = 0 through Sunday = 6
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

/// Seven completion totals, one per day of the trailing window
///
/// Slot 0 is Monday and slot 6 is Sunday when a completion is recorded,
/// while the daily rollover shifts every slot one step to the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeeklyCompletions([u32; WINDOW_DAYS]);

impl WeeklyCompletions {
    /// A window with no completions
    pub fn zeroed() -> Self {
        Self([0; WINDOW_DAYS])
    }

    pub fn new(slots: [u32; WINDOW_DAYS]) -> Self {
        Self(slots)
    }

    /// Drop the oldest slot and open a fresh zero slot at the end
    pub fn rotate_for_new_day(&mut self) {
        self.0.rotate_left(1);
        self.0[WINDOW_DAYS - 1] = 0;
    }

    /// Add one completion to the slot belonging to `day`
    pub fn record(&mut self, day: Weekday) {
        let slot = &mut self.0[day.num_days_from_monday() as usize];
        *slot = slot.saturating_add(1);
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied()
    }

    /// Sum of completions across the window
    pub fn total(&self) -> u64 {
        self.0.iter().map(|&n| u64::from(n)).sum()
    }

    pub fn as_array(&self) -> &[u32; WINDOW_DAYS] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.0.to_vec()
    }
}

impl From<[u32; WINDOW_DAYS]> for WeeklyCompletions {
    fn from(slots: [u32; WINDOW_DAYS]) -> Self {
        Self(slots)
    }
}

impl TryFrom<Vec<i64>> for WeeklyCompletions {
    type Error = DomainError;

    /// Build a window from persisted integers, rejecting a wrong length or a
    /// negative count rather than padding or clamping
    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        if values.len() != WINDOW_DAYS {
            return Err(DomainError::InvalidHistory { len: values.len() });
        }

        let mut slots = [0u32; WINDOW_DAYS];
        for (slot, value) in slots.iter_mut().zip(values) {
            *slot = u32::try_from(value).map_err(|_| DomainError::InvalidValue {
                message: format!("Weekly completion count out of range: {}", value),
            })?;
        }

        Ok(Self(slots))
    }
}
