/// Source of "today" for the store and the day-transition check

use std::sync::Mutex;
use chrono::{Duration, Local, NaiveDate};

/// Supplies the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that stays on one date until told otherwise
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date: Mutex::new(date) }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap_or_else(|p| p.into_inner()) = date;
    }

    /// Move the clock forward by whole days
    pub fn advance_days(&self, days: i64) {
        let mut date = self.date.lock().unwrap_or_else(|p| p.into_inner());
        *date = *date + Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(|p| p.into_inner())
    }
}
