//! In-memory arena holding every routine and the rollover marker.
//!
//! The store is the working copy the engine mutates; a
//! [`Persistence`](crate::storage::Persistence) backend writes it out. Removals
//! are recorded as tombstones so a backend can delete rows that no longer
//! appear in the arena. Tombstones survive a failed save and are flushed by
//! the next successful one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{CompletionId, Routine, RoutineId, TaskId};

/// A removal waiting to be written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Tombstone {
    /// Routine and everything it owns.
    Routine(RoutineId),
    Task(TaskId),
    Completion(CompletionId),
}

/// What a backend hands back on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub routines: Vec<Routine>,
    pub last_midnight_check: Option<NaiveDate>,
}

/// Counts of entities removed by a cascade delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub tasks: usize,
    pub day_records: usize,
    pub completions: usize,
}

#[derive(Debug, Default)]
pub struct EntityStore {
    routines: Vec<Routine>,
    last_midnight_check: Option<NaiveDate>,
    tombstones: Vec<Tombstone>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut routines = snapshot.routines;
        for routine in &mut routines {
            routine.sort_tasks();
            routine.days.sort_by_key(|d| d.date);
        }
        Self {
            routines,
            last_midnight_check: snapshot.last_midnight_check,
            tombstones: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            routines: self.routines.clone(),
            last_midnight_check: self.last_midnight_check,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn routine(&self, id: RoutineId) -> Option<&Routine> {
        self.routines.iter().find(|r| r.id == id)
    }

    pub fn routine_mut(&mut self, id: RoutineId) -> Option<&mut Routine> {
        self.routines.iter_mut().find(|r| r.id == id)
    }

    pub fn active_routine(&self) -> Option<&Routine> {
        self.routines.iter().find(|r| r.active)
    }

    pub fn active_routine_id(&self) -> Option<RoutineId> {
        self.active_routine().map(|r| r.id)
    }

    pub fn active_count(&self) -> usize {
        self.routines.iter().filter(|r| r.active).count()
    }

    /// Find which routine owns a task.
    pub fn routine_for_task(&self, task_id: TaskId) -> Option<RoutineId> {
        self.routines
            .iter()
            .find(|r| r.task(task_id).is_some())
            .map(|r| r.id)
    }

    pub fn last_midnight_check(&self) -> Option<NaiveDate> {
        self.last_midnight_check
    }

    pub fn set_last_midnight_check(&mut self, day: NaiveDate) {
        self.last_midnight_check = Some(day);
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn insert_routine(&mut self, routine: Routine) {
        self.routines.push(routine);
    }

    /// Remove a routine and everything it owns.
    pub fn remove_routine(&mut self, id: RoutineId) -> Option<(Routine, CascadeSummary)> {
        let index = self.routines.iter().position(|r| r.id == id)?;
        let routine = self.routines.remove(index);
        let summary = CascadeSummary {
            tasks: routine.tasks.len(),
            day_records: routine.days.len(),
            completions: routine.days.iter().map(|d| d.completions.len()).sum(),
        };
        self.tombstones.push(Tombstone::Routine(id));
        Some((routine, summary))
    }

    pub fn record_task_removal(&mut self, task_id: TaskId) {
        self.tombstones.push(Tombstone::Task(task_id));
    }

    pub fn record_completion_removal(&mut self, completion_id: CompletionId) {
        self.tombstones.push(Tombstone::Completion(completion_id));
    }

    pub fn tombstones(&self) -> &[Tombstone] {
        &self.tombstones
    }

    /// Forget tombstones after a backend has applied them.
    pub fn clear_tombstones(&mut self) {
        self.tombstones.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CompletionState, DayRecord, RoutineOrigin, Task, TaskCompletion,
    };
    use chrono::{NaiveTime, Utc};

    fn routine_with_history() -> Routine {
        let id = RoutineId::new();
        let task = Task {
            id: TaskId::new(),
            routine_id: id,
            title: "Journal".into(),
            time: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
            order_index: 0,
            is_completed_today: false,
        };
        let mut day = DayRecord::new(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        day.completions
            .push(TaskCompletion::snapshot(&task, CompletionState::Completed));
        Routine {
            id,
            name: "Evening".into(),
            origin: RoutineOrigin::Preset,
            active: true,
            start_date: None,
            created_at: Utc::now(),
            tasks: vec![task],
            days: vec![day],
        }
    }

    #[test]
    fn remove_routine_cascades_and_records_tombstone() {
        let mut store = EntityStore::new();
        let routine = routine_with_history();
        let id = routine.id;
        store.insert_routine(routine);

        let (_, summary) = store.remove_routine(id).unwrap();
        assert_eq!(
            summary,
            CascadeSummary {
                tasks: 1,
                day_records: 1,
                completions: 1
            }
        );
        assert!(store.routine(id).is_none());
        assert!(store.active_routine().is_none());
        assert_eq!(store.tombstones(), &[Tombstone::Routine(id)]);
    }

    #[test]
    fn remove_unknown_routine_is_a_no_op() {
        let mut store = EntityStore::new();
        assert!(store.remove_routine(RoutineId::new()).is_none());
        assert!(store.tombstones().is_empty());
    }

    #[test]
    fn routine_for_task_finds_owner() {
        let mut store = EntityStore::new();
        let routine = routine_with_history();
        let task_id = routine.tasks[0].id;
        let id = routine.id;
        store.insert_routine(routine);
        assert_eq!(store.routine_for_task(task_id), Some(id));
        assert_eq!(store.routine_for_task(TaskId::new()), None);
    }
}
