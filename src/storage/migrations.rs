/// Schema setup for the SQLite backend
///
/// Migrations are listed in order and each one runs in its own
/// transaction together with the version bump that records it.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::storage::StorageError;

/// One schema step: the version it produces, a label for logs, and its SQL
struct Migration {
    version: i32,
    label: &'static str,
    sql: &'static str,
}

/// Every migration, oldest first
///
/// v1 keeps one row per habit with the weekly history as JSON text.
/// v2 remembers whether today's completion was already counted.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        label: "habits table",
        sql: "CREATE TABLE IF NOT EXISTS habits (
                  id INTEGER PRIMARY KEY,
                  position INTEGER NOT NULL,
                  name TEXT NOT NULL,
                  description TEXT NOT NULL DEFAULT '',
                  target_per_day INTEGER NOT NULL,
                  completed_today INTEGER NOT NULL DEFAULT 0,
                  weekly_completions TEXT
              );
              CREATE INDEX IF NOT EXISTS idx_habits_position ON habits (position);",
    },
    Migration {
        version: 2,
        label: "recorded_today column",
        sql: "ALTER TABLE habits ADD COLUMN recorded_today INTEGER NOT NULL DEFAULT 0;",
    },
];

/// Newest schema this build understands
pub const CURRENT_VERSION: i32 = 2;

/// Bring the schema up to [`CURRENT_VERSION`]
///
/// Safe to call on every open. A file written by a newer build is refused
/// rather than guessed at.
pub fn initialize_database(conn: &mut Connection) -> Result<(), StorageError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);")?;

    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StorageError::Migration(format!(
            "database schema v{} is newer than supported v{}",
            found, CURRENT_VERSION
        )));
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute("DELETE FROM schema_version", [])?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [migration.version])?;
        tx.commit()?;
        info!("Applied migration v{}: {}", migration.version, migration.label);
    }

    Ok(())
}

/// Recorded schema version, 0 for a fresh file
pub fn schema_version(conn: &Connection) -> Result<i32, StorageError> {
    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}
