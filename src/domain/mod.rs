/// Domain module containing the habit record and its rolling history
///
/// This module defines the core entity (HabitRecord), the 7-slot weekly
/// completion window, and the validation rules applied at the mutation boundary.

pub mod habit;
pub mod types;

// Re-export public types for easy access
pub use habit::*;
pub use types::*;

use thiserror::Error;

/// Errors that can occur during domain operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid habit name: {0}")]
    InvalidHabitName(String),

    #[error("Invalid target per day: {value} (must be greater than 0)")]
    InvalidTarget { value: i64 },

    #[error("Invalid weekly history: expected 7 slots, got {len}")]
    InvalidHistory { len: usize },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },
}
