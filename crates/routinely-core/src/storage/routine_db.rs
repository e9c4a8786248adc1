//! SQLite-backed persistence for routines and their history.
//!
//! Every save runs in one transaction: tombstones are applied first, then each
//! routine is upserted along with its tasks, day records and completions.
//! Upserts use `ON CONFLICT DO UPDATE` rather than `INSERT OR REPLACE` so a
//! parent update never fires the child cascades.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations, Persistence};
use crate::error::DatabaseError;
use crate::model::{
    CompletionState, DayRecord, DayStatus, Routine, RoutineId, RoutineOrigin, Task,
    TaskCompletion,
};
use crate::store::{EntityStore, Snapshot, Tombstone};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const LAST_CHECK_KEY: &str = "last_midnight_check";

// === Helper Functions ===

fn parse_field<T>(table: &'static str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| DatabaseError::CorruptRow {
        table,
        message: format!("'{value}': {e}"),
    })
}

fn parse_date(table: &'static str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| DatabaseError::CorruptRow {
        table,
        message: format!("bad date '{value}': {e}"),
    })
}

fn parse_time(value: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|e| DatabaseError::CorruptRow {
        table: "tasks",
        message: format!("bad time of day '{value}': {e}"),
    })
}

/// Parse a stored timestamp, falling back to now for legacy empty values.
fn parse_datetime_fallback(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

type RoutineRow = (String, String, String, bool, Option<String>, String);
type TaskRow = (String, String, String, String, i64, bool);
type DayRow = (String, String, String, i64, String);
type CompletionRow = (String, String, String, String, i64, String);

/// SQLite database for routine storage.
pub struct RoutineDb {
    conn: Connection,
}

impl RoutineDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/routinely/routinely.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, crate::error::CoreError> {
        let path = data_dir()?.join("routinely.db");
        Ok(Self::open_path(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_path(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // === Key-value state ===

    fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // === Load ===

    fn load_routines(&self) -> Result<Vec<Routine>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, origin, active, start_date, created_at
             FROM routines
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<RoutineRow>, _>>()?;

        rows.into_iter()
            .map(|(id, name, origin, active, start_date, created_at)| {
                Ok(Routine {
                    id: parse_field("routines", &id)?,
                    name,
                    origin: parse_field::<RoutineOrigin>("routines", &origin)?,
                    active,
                    start_date: start_date
                        .as_deref()
                        .map(|d| parse_date("routines", d))
                        .transpose()?,
                    created_at: parse_datetime_fallback(&created_at),
                    tasks: Vec::new(),
                    days: Vec::new(),
                })
            })
            .collect()
    }

    fn load_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, routine_id, title, time_of_day, order_index, completed_today
             FROM tasks
             ORDER BY routine_id, order_index ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<TaskRow>, _>>()?;

        rows.into_iter()
            .map(|(id, routine_id, title, time, order_index, completed_today)| {
                Ok(Task {
                    id: parse_field("tasks", &id)?,
                    routine_id: parse_field("tasks", &routine_id)?,
                    title,
                    time: parse_time(&time)?,
                    order_index: to_count(order_index),
                    is_completed_today: completed_today,
                })
            })
            .collect()
    }

    /// Day records keyed by routine, with their completions attached.
    fn load_days(&self) -> Result<HashMap<RoutineId, Vec<DayRecord>>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, day_record_id, task_id, task_title, order_index, state
             FROM task_completions
             ORDER BY order_index ASC",
        )?;
        let completion_rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<CompletionRow>, _>>()?;

        let mut completions: HashMap<String, Vec<TaskCompletion>> = HashMap::new();
        for (id, day_record_id, task_id, task_title, order_index, state) in completion_rows {
            completions
                .entry(day_record_id)
                .or_default()
                .push(TaskCompletion {
                    id: parse_field("task_completions", &id)?,
                    task_id: parse_field("task_completions", &task_id)?,
                    task_title,
                    order_index: to_count(order_index),
                    state: parse_field::<CompletionState>("task_completions", &state)?,
                });
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, routine_id, day, completed_count, status
             FROM day_records
             ORDER BY day ASC",
        )?;
        let day_rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<Vec<DayRow>, _>>()?;

        let mut days: HashMap<RoutineId, Vec<DayRecord>> = HashMap::new();
        for (id, routine_id, day, completed_count, status) in day_rows {
            let record = DayRecord {
                id: parse_field("day_records", &id)?,
                date: parse_date("day_records", &day)?,
                completed_count: to_count(completed_count),
                status: parse_field::<DayStatus>("day_records", &status)?,
                completions: completions.remove(&id).unwrap_or_default(),
            };
            days.entry(parse_field("day_records", &routine_id)?)
                .or_default()
                .push(record);
        }
        Ok(days)
    }

    // === Save ===

    fn apply_tombstones(tx: &Connection, tombstones: &[Tombstone]) -> Result<(), rusqlite::Error> {
        for tombstone in tombstones {
            match tombstone {
                Tombstone::Routine(id) => {
                    tx.execute("DELETE FROM routines WHERE id = ?1", params![id.to_string()])?;
                }
                Tombstone::Task(id) => {
                    tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
                }
                Tombstone::Completion(id) => {
                    tx.execute(
                        "DELETE FROM task_completions WHERE id = ?1",
                        params![id.to_string()],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn upsert_routine(tx: &Connection, routine: &Routine) -> Result<(), rusqlite::Error> {
        tx.execute(
            "INSERT INTO routines (id, name, origin, active, start_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                origin = excluded.origin,
                active = excluded.active,
                start_date = excluded.start_date",
            params![
                routine.id.to_string(),
                routine.name,
                routine.origin.as_str(),
                routine.active,
                routine.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                routine.created_at.to_rfc3339(),
            ],
        )?;

        for task in &routine.tasks {
            tx.execute(
                "INSERT INTO tasks (id, routine_id, title, time_of_day, order_index, completed_today)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    time_of_day = excluded.time_of_day,
                    order_index = excluded.order_index,
                    completed_today = excluded.completed_today",
                params![
                    task.id.to_string(),
                    routine.id.to_string(),
                    task.title,
                    task.time.format(TIME_FORMAT).to_string(),
                    task.order_index,
                    task.is_completed_today,
                ],
            )?;
        }

        for day in &routine.days {
            let day_id = day.id.to_string();
            tx.execute(
                "INSERT INTO day_records (id, routine_id, day, completed_count, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    completed_count = excluded.completed_count,
                    status = excluded.status",
                params![
                    day_id,
                    routine.id.to_string(),
                    day.date.format(DATE_FORMAT).to_string(),
                    day.completed_count,
                    day.status.as_str(),
                ],
            )?;

            for completion in &day.completions {
                tx.execute(
                    "INSERT INTO task_completions
                        (id, day_record_id, task_id, task_title, order_index, state)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET state = excluded.state",
                    params![
                        completion.id.to_string(),
                        day_id,
                        completion.task_id.to_string(),
                        completion.task_title,
                        completion.order_index,
                        completion.state.as_str(),
                    ],
                )?;
            }
        }
        Ok(())
    }
}

impl Persistence for RoutineDb {
    fn load(&mut self) -> Result<Snapshot, DatabaseError> {
        let mut routines = self.load_routines()?;
        let mut tasks_by_routine: HashMap<RoutineId, Vec<Task>> = HashMap::new();
        for task in self.load_tasks()? {
            tasks_by_routine.entry(task.routine_id).or_default().push(task);
        }
        let mut days_by_routine = self.load_days()?;

        for routine in &mut routines {
            routine.tasks = tasks_by_routine.remove(&routine.id).unwrap_or_default();
            routine.days = days_by_routine.remove(&routine.id).unwrap_or_default();
        }

        let last_midnight_check = self
            .kv_get(LAST_CHECK_KEY)?
            .map(|value| parse_date("kv", &value))
            .transpose()?;

        Ok(Snapshot {
            routines,
            last_midnight_check,
        })
    }

    fn save(&mut self, store: &EntityStore) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;

        Self::apply_tombstones(&tx, store.tombstones())?;

        // Retired routines first so the single-active index never sees two.
        let mut ordered: Vec<&Routine> = store.routines().iter().collect();
        ordered.sort_by_key(|r| r.active);
        for routine in ordered {
            Self::upsert_routine(&tx, routine)?;
        }

        if let Some(day) = store.last_midnight_check() {
            Self::kv_set(&tx, LAST_CHECK_KEY, &day.format(DATE_FORMAT).to_string())?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RoutineOrigin, TaskId};

    fn sample_routine(active: bool) -> Routine {
        let id = RoutineId::new();
        let task = Task {
            id: TaskId::new(),
            routine_id: id,
            title: "Meditate".into(),
            time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            order_index: 0,
            is_completed_today: true,
        };
        let mut day = DayRecord::new(NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        day.insert_completion_if_absent(&task, CompletionState::Completed);
        day.completed_count = 1;
        day.status = DayStatus::Finalized;
        Routine {
            id,
            name: "Calm mornings".into(),
            origin: RoutineOrigin::Preset,
            active,
            start_date: Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()),
            created_at: Utc::now(),
            tasks: vec![task],
            days: vec![day],
        }
    }

    fn count(db: &RoutineDb, table: &str) -> i64 {
        db.conn()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn save_then_load_round_trips_the_store() {
        let mut db = RoutineDb::open_memory().unwrap();
        let routine = sample_routine(true);
        let mut store = EntityStore::new();
        store.insert_routine(routine.clone());
        store.set_last_midnight_check(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());

        db.save(&store).unwrap();
        let snapshot = db.load().unwrap();

        assert_eq!(snapshot.routines.len(), 1);
        let loaded = &snapshot.routines[0];
        assert_eq!(loaded.id, routine.id);
        assert_eq!(loaded.tasks, routine.tasks);
        assert_eq!(loaded.days, routine.days);
        assert_eq!(
            snapshot.last_midnight_check,
            NaiveDate::from_ymd_opt(2026, 3, 4)
        );
    }

    #[test]
    fn routine_tombstone_cascades_rows() {
        let mut db = RoutineDb::open_memory().unwrap();
        let routine = sample_routine(false);
        let id = routine.id;
        let mut store = EntityStore::new();
        store.insert_routine(routine);
        db.save(&store).unwrap();
        assert_eq!(count(&db, "task_completions"), 1);

        store.remove_routine(id);
        db.save(&store).unwrap();

        assert_eq!(count(&db, "routines"), 0);
        assert_eq!(count(&db, "tasks"), 0);
        assert_eq!(count(&db, "day_records"), 0);
        assert_eq!(count(&db, "task_completions"), 0);
    }

    #[test]
    fn switching_active_routine_respects_single_active_index() {
        let mut db = RoutineDb::open_memory().unwrap();
        let first = sample_routine(true);
        let second = sample_routine(false);
        let (first_id, second_id) = (first.id, second.id);
        let mut store = EntityStore::new();
        store.insert_routine(first);
        store.insert_routine(second);
        db.save(&store).unwrap();

        store.routine_mut(second_id).unwrap().active = true;
        store.routine_mut(first_id).unwrap().active = false;
        db.save(&store).unwrap();

        let active: String = db
            .conn()
            .query_row("SELECT id FROM routines WHERE active = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(active, second_id.to_string());
    }

    #[test]
    fn completion_tombstone_frees_the_unique_slot() {
        let mut db = RoutineDb::open_memory().unwrap();
        let routine = sample_routine(true);
        let id = routine.id;
        let mut store = EntityStore::new();
        store.insert_routine(routine);
        db.save(&store).unwrap();

        let r = store.routine_mut(id).unwrap();
        let task = r.tasks[0].clone();
        let day = &mut r.days[0];
        let old = day.take_completion(task.id).unwrap();
        day.insert_completion_if_absent(&task, CompletionState::Incomplete);
        store.record_completion_removal(old.id);
        db.save(&store).unwrap();

        let state: String = db
            .conn()
            .query_row("SELECT state FROM task_completions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(state, "incomplete");
    }

    #[test]
    fn kv_store() {
        let db = RoutineDb::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        RoutineDb::kv_set(db.conn(), "test", "hello").unwrap();
        RoutineDb::kv_set(db.conn(), "test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().as_deref(), Some("again"));
    }

    #[test]
    fn open_path_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routinely.db");
        let routine = sample_routine(true);
        {
            let mut db = RoutineDb::open_path(&path).unwrap();
            let mut store = EntityStore::new();
            store.insert_routine(routine.clone());
            db.save(&store).unwrap();
        }
        let mut db = RoutineDb::open_path(&path).unwrap();
        let snapshot = db.load().unwrap();
        assert_eq!(snapshot.routines[0].name, routine.name);
    }
}
