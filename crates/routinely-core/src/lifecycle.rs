//! Routine lifecycle engine.
//!
//! [`RoutineManager`] is the single writer for routine state. It owns the
//! entity store and the collaborators the engine talks to (persistence,
//! clock, notification scheduler), and every public mutation follows the
//! same shape: change the in-memory store, tell the scheduler, save.
//!
//! ## Phases
//!
//! ```text
//! activate/restart          start_date reached
//!   ──────────────► Pending ──────────────────► Running
//!                      │                           │
//!                      └──── deactivate ───────────┴──► Retired
//! ```
//!
//! Days roll over opportunistically: the host calls
//! [`RoutineManager::perform_midnight_check`] whenever the app comes to the
//! foreground. The check is gated on a stored day marker, so it runs at most
//! once per calendar day and may run hours after midnight. Mutations that
//! read the live flags (activate, deactivate, restart, toggle, task removal)
//! run the same rollover first, so a missed check never lets one day's flags
//! land in another day's record.
//!
//! A failed save leaves the in-memory change in place and returns the error.
//! Every write is an upsert, so the next successful save catches up.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::completion::{self, DaySummary, TaskOutcomeRow, ToggleOutcome};
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{
    CompletionState, DayStatus, NewRoutine, NewTask, Routine, RoutineId, RoutinePhase, Task,
    TaskId,
};
use crate::notify::NotificationScheduler;
use crate::storage::{Config, Persistence};
use crate::store::{CascadeSummary, EntityStore};
use crate::time::{previous_day, whole_minutes, Clock};
use crate::week::{self, WeekData};

/// Result of finalizing one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    pub date: NaiveDate,
    pub completed_count: u32,
    /// Completion rows added by this call.
    pub inserted: usize,
    /// Whether the day record already existed.
    pub existed: bool,
}

/// What a midnight check did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MidnightOutcome {
    /// Already ran today.
    AlreadyChecked,
    /// Marker advanced; nothing to finalize.
    NothingToFinalize,
    Finalized {
        routine_id: RoutineId,
        days: Vec<FinalizeSummary>,
    },
}

/// Explicit context for routine operations.
pub struct RoutineManager {
    store: EntityStore,
    backend: Box<dyn Persistence>,
    clock: Box<dyn Clock>,
    notifier: Box<dyn NotificationScheduler>,
    config: Config,
}

impl RoutineManager {
    /// Load the store from `backend` and build a manager around it.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn new(
        mut backend: Box<dyn Persistence>,
        clock: Box<dyn Clock>,
        notifier: Box<dyn NotificationScheduler>,
        config: Config,
    ) -> Result<Self> {
        let snapshot = backend.load()?;
        let store = EntityStore::from_snapshot(snapshot);
        if store.active_count() > 1 {
            tracing::warn!(
                active = store.active_count(),
                "loaded store has more than one active routine"
            );
        }
        Ok(Self {
            store,
            backend,
            clock,
            notifier,
            config,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn routines(&self) -> &[Routine] {
        self.store.routines()
    }

    pub fn routine(&self, id: RoutineId) -> Result<&Routine> {
        self.store.routine(id).ok_or(CoreError::RoutineNotFound(id))
    }

    pub fn active_routine(&self) -> Option<&Routine> {
        self.store.active_routine()
    }

    pub fn phase(&self, routine: &Routine) -> RoutinePhase {
        routine.phase(self.today())
    }

    pub fn last_midnight_check(&self) -> Option<NaiveDate> {
        self.store.last_midnight_check()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Create a routine and make it the active one, starting tomorrow.
    ///
    /// Any currently active routine is deactivated first.
    pub fn activate(&mut self, new_routine: NewRoutine) -> Result<RoutineId> {
        let mut routine = build_routine(new_routine)?;
        self.catch_up("activate")?;
        let today = self.today();

        if let Some(current) = self.store.active_routine_id() {
            self.retire(current, today);
        }

        routine.active = true;
        routine.start_date = Some(self.clock.tomorrow());
        let id = routine.id;
        self.store.insert_routine(routine);
        tracing::info!(routine_id = %id, start = ?self.clock.tomorrow(), "routine activated");

        self.schedule_reminder(id);
        self.commit("activate")?;
        Ok(id)
    }

    /// Store a routine without activating it.
    pub fn create_routine(&mut self, new_routine: NewRoutine) -> Result<RoutineId> {
        let routine = build_routine(new_routine)?;
        let id = routine.id;
        self.store.insert_routine(routine);
        tracing::debug!(routine_id = %id, "routine created");
        self.commit("create_routine")?;
        Ok(id)
    }

    /// Retire a routine, finalizing today first if it was running.
    pub fn deactivate(&mut self, id: RoutineId) -> Result<()> {
        self.routine(id)?;
        self.catch_up("deactivate")?;
        let today = self.today();
        self.retire(id, today);
        self.commit("deactivate")
    }

    /// Make a routine active again from tomorrow with a clean slate.
    ///
    /// Whatever routine is active right now (including this one) has its
    /// today finalized if it was running. History is kept.
    pub fn restart(&mut self, id: RoutineId) -> Result<()> {
        self.routine(id)?;
        self.catch_up("restart")?;
        let today = self.today();
        let tomorrow = self.clock.tomorrow();

        if let Some(current) = self.store.active_routine_id() {
            if current != id {
                self.retire(current, today);
            } else if self.routine(id)?.is_running(today) {
                self.finalize_in_place(id, today);
            }
        }

        if let Some(routine) = self.store.routine_mut(id) {
            routine.active = true;
            routine.start_date = Some(tomorrow);
            routine.clear_live_flags();
        }
        tracing::info!(routine_id = %id, start = ?tomorrow, "routine restarted");

        self.schedule_reminder(id);
        self.commit("restart")
    }

    /// Remove a routine and all of its history. Nothing is finalized.
    pub fn delete(&mut self, id: RoutineId) -> Result<CascadeSummary> {
        let was_active = self.routine(id)?.active;
        if was_active {
            self.cancel_reminder(id);
        }
        let (_, summary) = self
            .store
            .remove_routine(id)
            .ok_or(CoreError::RoutineNotFound(id))?;
        tracing::info!(
            routine_id = %id,
            tasks = summary.tasks,
            days = summary.day_records,
            completions = summary.completions,
            "routine deleted"
        );
        self.commit("delete")?;
        Ok(summary)
    }

    /// Snapshot a routine's day into history. Safe to call repeatedly.
    pub fn finalize_day(&mut self, id: RoutineId, date: NaiveDate) -> Result<FinalizeSummary> {
        self.routine(id)?;
        let summary = self
            .finalize_in_place(id, date)
            .ok_or(CoreError::RoutineNotFound(id))?;
        self.commit("finalize_day")?;
        Ok(summary)
    }

    /// Roll the active routine over to a new day, at most once per day.
    pub fn perform_midnight_check(&mut self) -> Result<MidnightOutcome> {
        let outcome = self.roll_over();
        if outcome != MidnightOutcome::AlreadyChecked {
            self.commit("midnight_check")?;
        }
        Ok(outcome)
    }

    // ── Routine editing ──────────────────────────────────────────────

    pub fn rename_routine(&mut self, id: RoutineId, name: &str) -> Result<()> {
        let name = non_empty(name, "name")?;
        let routine = self
            .store
            .routine_mut(id)
            .ok_or(CoreError::RoutineNotFound(id))?;
        routine.name = name;
        self.commit("rename_routine")
    }

    /// Append a task to a routine.
    pub fn add_task(&mut self, id: RoutineId, new_task: NewTask) -> Result<TaskId> {
        let title = non_empty(&new_task.title, "title")?;
        let routine = self
            .store
            .routine_mut(id)
            .ok_or(CoreError::RoutineNotFound(id))?;
        let task = Task {
            id: TaskId::new(),
            routine_id: id,
            title,
            time: whole_minutes(new_task.time),
            order_index: routine.next_order_index(),
            is_completed_today: false,
        };
        let task_id = task.id;
        routine.tasks.push(task);
        routine.sort_tasks();
        let active = routine.active;

        if active {
            self.schedule_reminder(id);
        }
        self.commit("add_task")?;
        Ok(task_id)
    }

    /// Remove a task. Past snapshots of it stay in history.
    pub fn remove_task(&mut self, task_id: TaskId) -> Result<()> {
        let id = self
            .store
            .routine_for_task(task_id)
            .ok_or(CoreError::TaskNotFound(task_id))?;
        self.catch_up("remove_task")?;
        let today = self.today();
        let routine = self
            .store
            .routine_mut(id)
            .ok_or(CoreError::RoutineNotFound(id))?;
        routine.tasks.retain(|t| t.id != task_id);

        // Today's live row goes with the task; finalized days keep theirs.
        let mut removed = None;
        if let Some(day) = routine.day_mut(today).filter(|d| !d.is_finalized()) {
            if let Some(row) = day.take_completion(task_id) {
                if row.state == CompletionState::Completed {
                    day.completed_count = day.completed_count.saturating_sub(1);
                }
                removed = Some(row.id);
            }
        }
        let active = routine.active;

        if let Some(row_id) = removed {
            self.store.record_completion_removal(row_id);
        }
        self.store.record_task_removal(task_id);

        if active {
            self.schedule_reminder(id);
        }
        self.commit("remove_task")
    }

    // ── Completion ───────────────────────────────────────────────────

    /// Toggle a task on today's live record of the running routine.
    pub fn toggle_task(&mut self, task_id: TaskId) -> Result<ToggleOutcome> {
        self.catch_up("toggle_task")?;
        let today = self.today();
        let routine = self
            .store
            .active_routine()
            .ok_or(CoreError::NoActiveRoutine)?;
        if routine.task(task_id).is_none() {
            return Err(CoreError::TaskNotFound(task_id));
        }
        if !routine.is_running(today) {
            return Err(CoreError::NotRunning(routine.id));
        }
        if routine.day(today).is_some_and(|d| d.is_finalized()) {
            return Err(CoreError::DayFinalized {
                routine_id: routine.id,
                date: today,
            });
        }
        let id = routine.id;

        let outcome = self
            .store
            .routine_mut(id)
            .and_then(|r| completion::toggle(r, task_id, today))
            .ok_or(CoreError::TaskNotFound(task_id))?;
        if let Some(row_id) = outcome.removed {
            self.store.record_completion_removal(row_id);
        }
        tracing::debug!(
            routine_id = %id,
            %task_id,
            completed = outcome.completed,
            count = outcome.completed_count,
            "task toggled"
        );

        self.commit("toggle_task")?;
        Ok(outcome)
    }

    /// Whether a task was completed on `date`. Unknown tasks read as false.
    pub fn is_task_completed(&self, task_id: TaskId, date: NaiveDate) -> bool {
        self.store
            .routine_for_task(task_id)
            .and_then(|id| self.store.routine(id))
            .is_some_and(|r| completion::is_completed(r, task_id, date))
    }

    pub fn day_outcomes(&self, id: RoutineId, date: NaiveDate) -> Result<Vec<TaskOutcomeRow>> {
        Ok(completion::day_outcomes(self.routine(id)?, date))
    }

    pub fn history(&self, id: RoutineId) -> Result<Vec<DaySummary>> {
        Ok(completion::history(self.routine(id)?))
    }

    // ── Week ─────────────────────────────────────────────────────────

    pub fn week_data(&self, id: RoutineId, week_offset: i32) -> Result<WeekData> {
        Ok(week::week_data(
            self.routine(id)?,
            self.today(),
            week_offset,
            self.config.week.starts_on,
        ))
    }

    // ── Internals ────────────────────────────────────────────────────

    /// In-memory half of the midnight check. Callers commit.
    fn roll_over(&mut self) -> MidnightOutcome {
        let today = self.today();
        let last_check = self.store.last_midnight_check();
        if last_check == Some(today) {
            tracing::debug!(%today, "midnight check already ran today");
            return MidnightOutcome::AlreadyChecked;
        }

        let yesterday = previous_day(today);
        let mut outcome = MidnightOutcome::NothingToFinalize;

        let running_since = self
            .store
            .active_routine()
            .and_then(|r| r.start_date.map(|start| (r.id, start)));

        if let Some((id, start)) = running_since {
            if start <= yesterday {
                let mut days = Vec::new();

                // The app was not opened for a while: the live flags belong
                // to the last checked day, not to yesterday.
                if let Some(stale) = last_check.filter(|d| *d < yesterday && *d >= start) {
                    days.extend(self.finalize_in_place(id, stale));
                    if let Some(routine) = self.store.routine_mut(id) {
                        routine.clear_live_flags();
                    }
                }

                days.extend(self.finalize_in_place(id, yesterday));
                if let Some(routine) = self.store.routine_mut(id) {
                    routine.clear_live_flags();
                }
                tracing::info!(routine_id = %id, %yesterday, "day rolled over");
                outcome = MidnightOutcome::Finalized {
                    routine_id: id,
                    days,
                };
            }
        }

        self.store.set_last_midnight_check(today);
        outcome
    }

    /// Bring the live flags up to today before a mutation reads them.
    ///
    /// A rollover that finalized days is saved on its own so a later
    /// rejection of the mutation cannot drop it.
    fn catch_up(&mut self, operation: &'static str) -> Result<()> {
        if let MidnightOutcome::Finalized { routine_id, days } = self.roll_over() {
            tracing::info!(
                operation,
                %routine_id,
                days = days.len(),
                "rolled over before mutation"
            );
            self.commit("midnight_check")?;
        }
        Ok(())
    }

    /// Finalize today if running, cancel the reminder, flip active off.
    fn retire(&mut self, id: RoutineId, today: NaiveDate) {
        let running = self.store.routine(id).is_some_and(|r| r.is_running(today));
        if running {
            self.finalize_in_place(id, today);
        }
        self.cancel_reminder(id);
        if let Some(routine) = self.store.routine_mut(id) {
            routine.active = false;
        }
        tracing::info!(routine_id = %id, finalized_today = running, "routine deactivated");
    }

    /// Upsert the day record and fill in a row for every task that lacks one.
    fn finalize_in_place(&mut self, id: RoutineId, date: NaiveDate) -> Option<FinalizeSummary> {
        let routine = self.store.routine_mut(id)?;
        let tasks = routine.tasks.clone();
        let existed = routine.day(date).is_some();
        let day = routine.day_or_insert(date);

        let mut inserted = 0;
        for task in &tasks {
            let state = CompletionState::from_flag(task.is_completed_today);
            if day.insert_completion_if_absent(task, state) {
                inserted += 1;
            }
        }
        day.completed_count = day.count_completed_rows();
        day.status = DayStatus::Finalized;

        tracing::debug!(
            routine_id = %id,
            %date,
            existed,
            inserted,
            completed = day.completed_count,
            "day finalized"
        );
        Some(FinalizeSummary {
            date,
            completed_count: day.completed_count,
            inserted,
            existed,
        })
    }

    fn schedule_reminder(&mut self, id: RoutineId) {
        if !self.config.notifications.enabled {
            return;
        }
        let Some(routine) = self.store.routine(id) else {
            return;
        };
        let Some(first) = routine.first_task() else {
            tracing::debug!(routine_id = %id, "no tasks; reminder not scheduled");
            return;
        };
        let title = routine.name.clone();
        let body = self
            .config
            .notifications
            .render_body(&routine.name, &first.title, first.time);
        let at = first.time;

        if let Err(err) = self.notifier.schedule_daily(id, at, &title, &body) {
            tracing::warn!(routine_id = %id, error = %err, "failed to schedule reminder");
        }
    }

    fn cancel_reminder(&mut self, id: RoutineId) {
        if let Err(err) = self.notifier.cancel(id) {
            tracing::warn!(routine_id = %id, error = %err, "failed to cancel reminder");
        }
    }

    fn commit(&mut self, operation: &'static str) -> Result<()> {
        match self.backend.save(&self.store) {
            Ok(()) => {
                self.store.clear_tombstones();
                Ok(())
            }
            Err(err) => {
                tracing::error!(operation, error = %err, "failed to persist routine state");
                Err(err.into())
            }
        }
    }
}

fn non_empty(value: &str, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field }.into());
    }
    Ok(trimmed.to_string())
}

fn build_routine(new_routine: NewRoutine) -> Result<Routine> {
    let name = non_empty(&new_routine.name, "name")?;
    let id = RoutineId::new();
    let tasks = new_routine
        .tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| {
            Ok(Task {
                id: TaskId::new(),
                routine_id: id,
                title: non_empty(&task.title, "title")?,
                time: whole_minutes(task.time),
                order_index: u32::try_from(index).unwrap_or(u32::MAX),
                is_completed_today: false,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Routine {
        id,
        name,
        origin: new_routine.origin,
        active: false,
        start_date: None,
        created_at: Utc::now(),
        tasks,
        days: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationCall, RecordingScheduler};
    use crate::storage::MemoryBackend;
    use crate::time::ManualClock;
    use chrono::{Local, NaiveTime, TimeZone};

    struct Harness {
        manager: RoutineManager,
        clock: ManualClock,
        backend: MemoryBackend,
        notifier: RecordingScheduler,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).single().unwrap());
        let backend = MemoryBackend::new();
        let notifier = RecordingScheduler::new();
        let manager = RoutineManager::new(
            Box::new(backend.clone()),
            Box::new(clock.clone()),
            Box::new(notifier.clone()),
            Config::default(),
        )
        .unwrap();
        Harness {
            manager,
            clock,
            backend,
            notifier,
        }
    }

    fn morning() -> NewRoutine {
        NewRoutine::custom("Morning")
            .with_task("Water", NaiveTime::from_hms_opt(7, 0, 0).unwrap())
            .with_task("Stretch", NaiveTime::from_hms_opt(7, 15, 0).unwrap())
    }

    #[test]
    fn activate_starts_tomorrow_and_schedules() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        let routine = h.manager.routine(id).unwrap();

        assert_eq!(routine.start_date, Some(h.clock.tomorrow()));
        assert_eq!(h.manager.phase(routine), RoutinePhase::Pending);
        assert_eq!(
            h.notifier.calls(),
            vec![NotificationCall::Schedule {
                routine_id: id,
                at: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                title: "Morning".into(),
                body: "Water at 07:00".into(),
            }]
        );
        assert_eq!(h.backend.save_count(), 1);
    }

    #[test]
    fn activate_rejects_blank_names() {
        let mut h = harness();
        let err = h.manager.activate(NewRoutine::custom("   ")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(h.manager.routines().is_empty());
    }

    #[test]
    fn toggle_requires_running_routine() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        let task_id = h.manager.routine(id).unwrap().tasks[0].id;

        let err = h.manager.toggle_task(task_id).unwrap_err();
        assert!(matches!(err, CoreError::NotRunning(_)));
        assert!(h.manager.routine(id).unwrap().days.is_empty());
    }

    #[test]
    fn toggle_without_active_routine_is_reported() {
        let mut h = harness();
        let err = h.manager.toggle_task(TaskId::new()).unwrap_err();
        assert!(matches!(err, CoreError::NoActiveRoutine));
    }

    #[test]
    fn deactivate_running_routine_finalizes_today() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.clock.advance_days(1);
        let task_id = h.manager.routine(id).unwrap().tasks[0].id;
        h.manager.toggle_task(task_id).unwrap();

        h.manager.deactivate(id).unwrap();

        let routine = h.manager.routine(id).unwrap();
        let today = h.manager.today();
        let day = routine.day(today).unwrap();
        assert_eq!(day.status, DayStatus::Finalized);
        assert_eq!(day.completions.len(), 2);
        assert_eq!(day.completed_count, 1);
        assert_eq!(h.manager.phase(routine), RoutinePhase::Retired);
        assert!(h
            .notifier
            .calls()
            .contains(&NotificationCall::Cancel { routine_id: id }));
    }

    #[test]
    fn deactivate_pending_routine_writes_no_history() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.manager.deactivate(id).unwrap();
        assert!(h.manager.routine(id).unwrap().days.is_empty());
        assert!(h.manager.active_routine().is_none());
    }

    #[test]
    fn finalize_day_twice_is_stable() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        let date = h.manager.today();

        let first = h.manager.finalize_day(id, date).unwrap();
        let rows = h.manager.routine(id).unwrap().day(date).unwrap().clone();
        let second = h.manager.finalize_day(id, date).unwrap();

        assert_eq!(first.inserted, 2);
        assert!(!first.existed);
        assert_eq!(second.inserted, 0);
        assert!(second.existed);
        assert_eq!(first.completed_count, second.completed_count);
        assert_eq!(h.manager.routine(id).unwrap().day(date).unwrap(), &rows);
    }

    #[test]
    fn restart_same_running_routine_seals_today() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.clock.advance_days(1);
        let task_id = h.manager.routine(id).unwrap().tasks[0].id;
        h.manager.toggle_task(task_id).unwrap();

        h.manager.restart(id).unwrap();

        let routine = h.manager.routine(id).unwrap();
        let today = h.manager.today();
        assert!(routine.day(today).unwrap().is_finalized());
        assert_eq!(routine.start_date, Some(h.clock.tomorrow()));
        assert!(routine.tasks.iter().all(|t| !t.is_completed_today));
    }

    #[test]
    fn failed_save_keeps_memory_state_and_heals_later() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.backend.fail_saves(true);

        let err = h.manager.delete(id).unwrap_err();
        assert!(matches!(err, CoreError::Database(_)));
        assert!(h.manager.routine(id).is_err());
        assert_eq!(h.backend.saved().routines.len(), 1);

        h.backend.fail_saves(false);
        h.clock.advance_days(1);
        h.manager.perform_midnight_check().unwrap();
        assert!(h.backend.saved().routines.is_empty());
        assert!(h.manager.store().tombstones().is_empty());
    }

    #[test]
    fn notifier_failure_does_not_block_transition() {
        let mut h = harness();
        h.notifier.set_failing(true);
        let id = h.manager.activate(morning()).unwrap();
        assert!(h.manager.routine(id).unwrap().active);
    }

    #[test]
    fn disabled_notifications_are_not_scheduled() {
        let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).single().unwrap());
        let notifier = RecordingScheduler::new();
        let mut config = Config::default();
        config.notifications.enabled = false;
        let mut manager = RoutineManager::new(
            Box::new(MemoryBackend::new()),
            Box::new(clock),
            Box::new(notifier.clone()),
            config,
        )
        .unwrap();
        manager.activate(morning()).unwrap();
        assert!(notifier.calls().is_empty());
    }

    #[test]
    fn remove_task_drops_live_row_and_keeps_history() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.clock.advance_days(1);
        let task_id = h.manager.routine(id).unwrap().tasks[0].id;
        let yesterday_day = h.manager.today();
        h.manager.toggle_task(task_id).unwrap();
        h.clock.advance_days(1);
        h.manager.perform_midnight_check().unwrap();
        h.manager.toggle_task(task_id).unwrap();

        h.manager.remove_task(task_id).unwrap();

        let routine = h.manager.routine(id).unwrap();
        assert_eq!(routine.tasks.len(), 1);
        let today = routine.day(h.manager.today()).unwrap();
        assert_eq!(today.completed_count, 0);
        assert!(today.completions.is_empty());
        let past = routine.day(yesterday_day).unwrap();
        assert!(past.completion(task_id).is_some());
    }

    #[test]
    fn add_task_reschedules_active_reminder() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.manager
            .add_task(
                id,
                NewTask {
                    title: "Sunlight".into(),
                    time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
                },
            )
            .unwrap();

        let routine = h.manager.routine(id).unwrap();
        assert_eq!(routine.tasks.len(), 3);
        assert_eq!(routine.tasks[2].order_index, 2);
        assert_eq!(h.notifier.calls().len(), 2);
    }

    #[test]
    fn rejected_toggle_still_saves_the_rollover() {
        let mut h = harness();
        let id = h.manager.activate(morning()).unwrap();
        h.clock.advance_days(1);
        h.manager.perform_midnight_check().unwrap();
        let task_id = h.manager.routine(id).unwrap().tasks[0].id;
        h.manager.toggle_task(task_id).unwrap();
        let played = h.manager.today();

        h.clock.advance_days(1);
        let err = h.manager.toggle_task(TaskId::new()).unwrap_err();
        assert!(matches!(err, CoreError::TaskNotFound(_)));

        let saved = h.backend.saved();
        let day = saved.routines[0].day(played).unwrap();
        assert!(day.is_finalized());
        assert_eq!(day.completed_count, 1);
        assert_eq!(saved.last_midnight_check, Some(h.manager.today()));
    }
}
