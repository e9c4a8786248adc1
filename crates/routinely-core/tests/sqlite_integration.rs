//! Integration tests for the SQLite backend driven through the manager.

use chrono::{Local, NaiveTime, TimeZone};
use routinely_core::{
    Config, ManualClock, NewRoutine, NewTask, NoopScheduler, RoutineDb, RoutineManager,
};

fn open(path: &std::path::Path, clock: &ManualClock) -> RoutineManager {
    RoutineManager::new(
        Box::new(RoutineDb::open_path(path).unwrap()),
        Box::new(clock.clone()),
        Box::new(NoopScheduler),
        Config::default(),
    )
    .unwrap()
}

fn count(path: &std::path::Path, table: &str) -> i64 {
    let db = RoutineDb::open_path(path).unwrap();
    db.conn()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routinely.db");
    let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().unwrap());

    let (id, played) = {
        let mut manager = open(&path, &clock);
        let id = manager
            .activate(
                NewRoutine::custom("Morning")
                    .with_task("Water", NaiveTime::from_hms_opt(7, 0, 0).unwrap())
                    .with_task("Walk", NaiveTime::from_hms_opt(7, 30, 0).unwrap()),
            )
            .unwrap();
        clock.advance_days(1);
        manager.perform_midnight_check().unwrap();
        let task = manager.routine(id).unwrap().tasks[1].id;
        manager.toggle_task(task).unwrap();
        (id, manager.today())
    };

    // The live flag and row survive a restart of the process.
    let mut manager = open(&path, &clock);
    let routine = manager.routine(id).unwrap();
    assert!(routine.tasks[1].is_completed_today);
    assert_eq!(routine.day(played).unwrap().completed_count, 1);
    assert_eq!(manager.last_midnight_check(), Some(played));

    clock.advance_days(1);
    manager.perform_midnight_check().unwrap();
    drop(manager);

    let manager = open(&path, &clock);
    let day = manager.routine(id).unwrap().day(played).unwrap().clone();
    assert!(day.is_finalized());
    assert_eq!(day.completions.len(), 2);
    assert_eq!(day.completed_count, 1);
}

#[test]
fn untoggle_deletes_the_stored_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routinely.db");
    let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().unwrap());

    let mut manager = open(&path, &clock);
    let id = manager
        .activate(
            NewRoutine::custom("Evening")
                .with_task("Read", NaiveTime::from_hms_opt(21, 0, 0).unwrap()),
        )
        .unwrap();
    clock.advance_days(1);
    let task = manager.routine(id).unwrap().tasks[0].id;

    manager.toggle_task(task).unwrap();
    assert_eq!(count(&path, "task_completions"), 1);
    manager.toggle_task(task).unwrap();
    assert_eq!(count(&path, "task_completions"), 0);
    manager.toggle_task(task).unwrap();
    assert_eq!(count(&path, "task_completions"), 1);
}

#[test]
fn delete_cascades_in_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routinely.db");
    let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().unwrap());

    let mut manager = open(&path, &clock);
    let id = manager
        .activate(
            NewRoutine::preset("Wind down")
                .with_task("Tea", NaiveTime::from_hms_opt(20, 0, 0).unwrap())
                .with_task("Lights out", NaiveTime::from_hms_opt(22, 30, 0).unwrap()),
        )
        .unwrap();
    clock.advance_days(1);
    let today = manager.today();
    manager.finalize_day(id, today).unwrap();
    assert_eq!(count(&path, "task_completions"), 2);

    manager.delete(id).unwrap();

    for table in ["routines", "tasks", "day_records", "task_completions"] {
        assert_eq!(count(&path, table), 0, "{table} not empty");
    }
}

#[test]
fn switching_routines_keeps_one_active_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routinely.db");
    let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().unwrap());

    let mut manager = open(&path, &clock);
    let first = manager.activate(NewRoutine::custom("A")).unwrap();
    let second = manager.activate(NewRoutine::custom("B")).unwrap();
    manager.restart(first).unwrap();

    let db = RoutineDb::open_path(&path).unwrap();
    let active: Vec<String> = db
        .conn()
        .prepare("SELECT id FROM routines WHERE active = 1")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(active, vec![first.to_string()]);
    assert_ne!(first, second);
}

#[test]
fn task_times_reload_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routinely.db");
    let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().unwrap());

    let (id, stored) = {
        let mut manager = open(&path, &clock);
        let id = manager
            .activate(
                NewRoutine::custom("Morning")
                    .with_task("Water", NaiveTime::from_hms_milli_opt(7, 15, 42, 500).unwrap()),
            )
            .unwrap();
        let added = manager
            .add_task(
                id,
                NewTask {
                    title: "Walk".into(),
                    time: NaiveTime::from_hms_opt(7, 45, 59).unwrap(),
                },
            )
            .unwrap();
        let routine = manager.routine(id).unwrap();
        assert_eq!(routine.tasks[0].time, NaiveTime::from_hms_opt(7, 15, 0).unwrap());
        assert_eq!(routine.task(added).unwrap().time, NaiveTime::from_hms_opt(7, 45, 0).unwrap());
        (id, routine.clone())
    };

    let manager = open(&path, &clock);
    assert_eq!(manager.routine(id).unwrap().tasks, stored.tasks);
}
