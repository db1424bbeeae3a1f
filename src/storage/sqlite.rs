/// SQLite implementation of the habit backend
///
/// Each habit is one row. A save replaces every row inside a single
/// transaction, so readers never observe half of a list.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::domain::{HabitId, HabitRecord, WeeklyCompletions};
use crate::storage::{codec, migrations, HabitBackend, StorageError};

/// Raw column values of one `habits` row
struct HabitRow {
    id: i64,
    name: String,
    description: String,
    target_per_day: i64,
    completed_today: i64,
    weekly_completions: Option<String>,
    recorded_today: bool,
}

impl HabitRow {
    fn into_record(self) -> Result<HabitRecord, StorageError> {
        let id = self.id;
        let invalid = move |reason: String| StorageError::InvalidRecord { id, reason };

        let target_per_day = u32::try_from(self.target_per_day)
            .map_err(|_| invalid(format!("target_per_day out of range: {}", self.target_per_day)))?;
        let completed_today = u32::try_from(self.completed_today)
            .map_err(|_| invalid(format!("completed_today out of range: {}", self.completed_today)))?;

        let weekly_completions = match &self.weekly_completions {
            Some(json) => {
                let values: Vec<i64> = serde_json::from_str(json)?;
                WeeklyCompletions::try_from(values).map_err(|e| invalid(e.to_string()))?
            }
            None => WeeklyCompletions::zeroed(),
        };

        Ok(HabitRecord::from_existing(
            HabitId(self.id),
            self.name,
            self.description,
            target_per_day,
            completed_today,
            weekly_completions,
            self.recorded_today,
        ))
    }
}

/// SQLite-based storage implementation
///
/// The connection is shared behind a mutex and all queries run on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    label: String,
}

impl SqliteBackend {
    /// Open (or create) a database file and bring its schema up to date
    pub fn new(db_path: PathBuf) -> Result<Self, StorageError> {
        let conn = Connection::open(&db_path)
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;

        let backend = Self::from_connection(conn, format!("sqlite:{}", db_path.display()))?;
        tracing::info!("SQLite storage initialized at: {:?}", db_path);
        Ok(backend)
    }

    /// A private in-memory database, mostly useful in tests
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn, "sqlite::memory:".to_string())
    }

    fn from_connection(mut conn: Connection, label: String) -> Result<Self, StorageError> {
        migrations::initialize_database(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            label,
        })
    }

    fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
        conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_rows(conn: &Connection) -> Result<Vec<HabitRecord>, StorageError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, description, target_per_day, completed_today, weekly_completions, recorded_today
             FROM habits ORDER BY position, id"
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(HabitRow {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                target_per_day: row.get(3)?,
                completed_today: row.get(4)?,
                weekly_completions: row.get(5)?,
                recorded_today: row.get(6)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }

        codec::ensure_unique_ids(&records)?;
        Ok(records)
    }

    fn replace_rows(conn: &mut Connection, records: &[HabitRecord]) -> Result<(), StorageError> {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM habits", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO habits (
                    id, position, name, description, target_per_day,
                    completed_today, weekly_completions, recorded_today
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            )?;

            for (position, record) in records.iter().enumerate() {
                let weekly_json = serde_json::to_string(record.weekly_completions.as_array())?;
                insert.execute(params![
                    record.id.value(),
                    position as i64,
                    record.name,
                    record.description,
                    record.target_per_day,
                    record.completed_today,
                    weekly_json,
                    record.recorded_today,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl HabitBackend for SqliteBackend {
    async fn load(&self) -> Result<Vec<HabitRecord>, StorageError> {
        let conn = Arc::clone(&self.conn);
        let records = tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&conn);
            Self::load_rows(&conn)
        })
        .await??;

        tracing::debug!("Loaded {} habits from {}", records.len(), self.label);
        Ok(records)
    }

    async fn save_all(&self, records: &[HabitRecord]) -> Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        let records = records.to_vec();
        let count = records.len();

        tokio::task::spawn_blocking(move || {
            let mut conn = Self::lock(&conn);
            Self::replace_rows(&mut conn, &records)
        })
        .await??;

        tracing::debug!("Saved {} habits to {}", count, self.label);
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
