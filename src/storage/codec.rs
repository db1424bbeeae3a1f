/// Wire schema for persisted habits
///
/// The persisted format is a JSON array of habit objects. Every field a
/// previous version could have left out is decoded as optional and filled
/// in explicitly here, so the default rules live in one place instead of in
/// the decoder's implicit behavior.

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::domain::{DomainError, HabitId, HabitRecord, WeeklyCompletions};
use crate::storage::StorageError;

/// Version of the habit document layout
///
/// 1: id, name, description, targetPerDay, completedToday, weeklyCompletions
/// 2: adds recordedToday
pub const SCHEMA_VERSION: u32 = 2;

/// One habit as it appears in the persisted JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDocument {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_per_day: i64,
    #[serde(default)]
    pub completed_today: Option<i64>,
    #[serde(default)]
    pub weekly_completions: Option<Vec<i64>>,
    #[serde(default)]
    pub recorded_today: Option<bool>,
}

impl From<HabitRecord> for HabitDocument {
    fn from(record: HabitRecord) -> Self {
        Self {
            id: record.id.value(),
            name: record.name,
            description: Some(record.description),
            target_per_day: i64::from(record.target_per_day),
            completed_today: Some(i64::from(record.completed_today)),
            weekly_completions: Some(
                record.weekly_completions.to_vec().into_iter().map(i64::from).collect()
            ),
            recorded_today: Some(record.recorded_today),
        }
    }
}

impl TryFrom<HabitDocument> for HabitRecord {
    type Error = DomainError;

    fn try_from(doc: HabitDocument) -> Result<Self, Self::Error> {
        if doc.name.trim().is_empty() {
            return Err(DomainError::InvalidHabitName(
                format!("Habit {} has an empty name", doc.id)
            ));
        }

        let target_per_day = u32::try_from(doc.target_per_day).map_err(|_| {
            DomainError::InvalidTarget { value: doc.target_per_day }
        })?;

        let completed_today = doc.completed_today.unwrap_or(0);
        let completed_today = u32::try_from(completed_today).map_err(|_| DomainError::InvalidValue {
            message: format!("completedToday out of range: {}", completed_today)
        })?;

        // Documents written before the weekly history existed start with an empty window
        let weekly_completions = match doc.weekly_completions {
            Some(values) => WeeklyCompletions::try_from(values)?,
            None => WeeklyCompletions::zeroed(),
        };

        Ok(HabitRecord::from_existing(
            HabitId(doc.id),
            doc.name,
            doc.description.unwrap_or_default(),
            target_per_day,
            completed_today,
            weekly_completions,
            doc.recorded_today.unwrap_or(false),
        ))
    }
}

/// Encode the full habit list as a JSON array
pub fn encode(records: &[HabitRecord]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(records)?)
}

/// Decode a JSON array of habits, rejecting duplicate ids
pub fn decode(json: &str) -> Result<Vec<HabitRecord>, StorageError> {
    let records: Vec<HabitRecord> = serde_json::from_str(json)?;
    ensure_unique_ids(&records)?;
    Ok(records)
}

/// Check the uniqueness invariant on a decoded list
pub fn ensure_unique_ids(records: &[HabitRecord]) -> Result<(), StorageError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            return Err(StorageError::InvalidRecord {
                id: record.id.value(),
                reason: "duplicate id".to_string(),
            });
        }
    }
    Ok(())
}
