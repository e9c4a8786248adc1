//! Per-task completion for a single day.
//!
//! These functions are mechanical: they do not check whether the routine is
//! running or whether `date` is today. [`RoutineManager::toggle_task`]
//! applies that gate before calling [`toggle`].
//!
//! [`RoutineManager::toggle_task`]: crate::RoutineManager::toggle_task

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{CompletionId, CompletionState, DayStatus, Routine, TaskCompletion, TaskId};

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    /// Whether the task is completed after the toggle.
    pub completed: bool,
    pub completed_count: u32,
    /// Row removed by an un-toggle; the caller records it as a tombstone.
    pub removed: Option<CompletionId>,
}

/// Flip a task between completed and untouched on `date`.
///
/// Returns `None` if the task does not belong to the routine.
pub fn toggle(routine: &mut Routine, task_id: TaskId, date: NaiveDate) -> Option<ToggleOutcome> {
    let task = routine.task(task_id)?.clone();
    let day = routine.day_or_insert(date);

    let outcome = match day.take_completion(task_id) {
        Some(removed) => {
            day.completed_count = day.completed_count.saturating_sub(1);
            ToggleOutcome {
                completed: false,
                completed_count: day.completed_count,
                removed: Some(removed.id),
            }
        }
        None => {
            day.completions
                .push(TaskCompletion::snapshot(&task, CompletionState::Completed));
            day.completed_count = day.completed_count.saturating_add(1);
            ToggleOutcome {
                completed: true,
                completed_count: day.completed_count,
                removed: None,
            }
        }
    };

    if let Some(task) = routine.task_mut(task_id) {
        task.is_completed_today = outcome.completed;
    }
    Some(outcome)
}

/// Whether a completed row exists for the task on `date`.
pub fn is_completed(routine: &Routine, task_id: TaskId, date: NaiveDate) -> bool {
    routine
        .day(date)
        .and_then(|day| day.completion(task_id))
        .is_some_and(|c| c.state == CompletionState::Completed)
}

/// Resolved outcome of one task on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Completed,
    Incomplete,
    /// No row on a live day.
    Untouched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcomeRow {
    pub task_id: TaskId,
    pub title: String,
    pub order_index: u32,
    pub outcome: TaskOutcome,
}

/// Per-task outcomes for a day.
///
/// Finalized days list their snapshots, plus any current task that has no
/// row (added after finalization), which reads as incomplete. Live or absent
/// days list the routine's current tasks.
pub fn day_outcomes(routine: &Routine, date: NaiveDate) -> Vec<TaskOutcomeRow> {
    let day = routine.day(date);
    let finalized = day.is_some_and(|d| d.status == DayStatus::Finalized);

    let mut rows: Vec<TaskOutcomeRow> = Vec::new();
    if let (true, Some(day)) = (finalized, day) {
        rows.extend(day.completions.iter().map(|c| TaskOutcomeRow {
            task_id: c.task_id,
            title: c.task_title.clone(),
            order_index: c.order_index,
            outcome: match c.state {
                CompletionState::Completed => TaskOutcome::Completed,
                CompletionState::Incomplete => TaskOutcome::Incomplete,
            },
        }));
    }

    for task in &routine.tasks {
        if rows.iter().any(|r| r.task_id == task.id) {
            continue;
        }
        let outcome = match day.and_then(|d| d.completion(task.id)) {
            Some(c) if c.state == CompletionState::Completed => TaskOutcome::Completed,
            Some(_) => TaskOutcome::Incomplete,
            None if finalized => TaskOutcome::Incomplete,
            None => TaskOutcome::Untouched,
        };
        rows.push(TaskOutcomeRow {
            task_id: task.id,
            title: task.title.clone(),
            order_index: task.order_index,
            outcome,
        });
    }

    rows.sort_by_key(|r| r.order_index);
    rows
}

/// One line of a routine's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub completed_count: u32,
    pub total: u32,
    pub status: DayStatus,
}

/// Every recorded day, newest first.
pub fn history(routine: &Routine) -> Vec<DaySummary> {
    let task_total = u32::try_from(routine.tasks.len()).unwrap_or(u32::MAX);
    let mut days: Vec<DaySummary> = routine
        .days
        .iter()
        .map(|d| DaySummary {
            date: d.date,
            completed_count: d.completed_count,
            total: match d.status {
                DayStatus::Finalized => {
                    u32::try_from(d.completions.len()).unwrap_or(u32::MAX)
                }
                DayStatus::Live => task_total,
            },
            status: d.status,
        })
        .collect();
    days.sort_by(|a, b| b.date.cmp(&a.date));
    days
}
