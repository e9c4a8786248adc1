//! Database schema migrations for routinely.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: routines, tasks, day records, completions and the kv table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS routines (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            origin      TEXT NOT NULL DEFAULT 'custom',
            active      INTEGER NOT NULL DEFAULT 0,
            start_date  TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id                  TEXT PRIMARY KEY,
            routine_id          TEXT NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
            title               TEXT NOT NULL,
            time_of_day         TEXT NOT NULL,
            order_index         INTEGER NOT NULL DEFAULT 0,
            completed_today     INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS day_records (
            id               TEXT PRIMARY KEY,
            routine_id       TEXT NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
            day              TEXT NOT NULL,
            completed_count  INTEGER NOT NULL DEFAULT 0,
            status           TEXT NOT NULL DEFAULT 'live',
            UNIQUE (routine_id, day)
        );

        -- task_id is a reference only: history outlives deleted tasks.
        CREATE TABLE IF NOT EXISTS task_completions (
            id             TEXT PRIMARY KEY,
            day_record_id  TEXT NOT NULL REFERENCES day_records(id) ON DELETE CASCADE,
            task_id        TEXT NOT NULL,
            task_title     TEXT NOT NULL,
            order_index    INTEGER NOT NULL DEFAULT 0,
            state          TEXT NOT NULL,
            UNIQUE (day_record_id, task_id)
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: lookup indexes and the single-active-routine guard.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_tasks_routine ON tasks(routine_id, order_index);
         CREATE INDEX IF NOT EXISTS idx_day_records_routine_day ON day_records(routine_id, day);
         CREATE INDEX IF NOT EXISTS idx_task_completions_day ON task_completions(day_record_id);
         CREATE UNIQUE INDEX IF NOT EXISTS idx_routines_single_active
             ON routines(active) WHERE active = 1;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
