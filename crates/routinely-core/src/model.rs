//! Persistent entities: routines, their tasks, and per-day history.
//!
//! Ownership follows the cascade rules: a [`Routine`] owns its tasks and its
//! day records, and a [`DayRecord`] owns its task completions. Dropping a
//! routine from the store drops everything below it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                Self(Uuid::nil())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Routine`].
    RoutineId
);
entity_id!(
    /// Identifier of a [`Task`].
    TaskId
);
entity_id!(
    /// Identifier of a [`DayRecord`].
    DayRecordId
);
entity_id!(
    /// Identifier of a [`TaskCompletion`].
    CompletionId
);

/// Where a routine came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineOrigin {
    Preset,
    Custom,
}

impl RoutineOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutineOrigin::Preset => "preset",
            RoutineOrigin::Custom => "custom",
        }
    }
}

impl FromStr for RoutineOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preset" => Ok(RoutineOrigin::Preset),
            "custom" => Ok(RoutineOrigin::Custom),
            other => Err(format!("unknown routine origin: {other}")),
        }
    }
}

/// Lifecycle phase of a routine relative to a given day.
///
/// Derived from `active` and `start_date`; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutinePhase {
    /// Active, but the start date has not arrived.
    Pending,
    /// Active and counting days.
    Running,
    /// Not active.
    Retired,
}

/// A named, ordered sequence of timed tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: RoutineId,
    pub name: String,
    pub origin: RoutineOrigin,
    pub active: bool,
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    /// Kept sorted by `order_index`.
    pub tasks: Vec<Task>,
    pub days: Vec<DayRecord>,
}

impl Routine {
    /// Phase of this routine as seen on `today`.
    pub fn phase(&self, today: NaiveDate) -> RoutinePhase {
        if !self.active {
            return RoutinePhase::Retired;
        }
        match self.start_date {
            Some(start) if start <= today => RoutinePhase::Running,
            _ => RoutinePhase::Pending,
        }
    }

    pub fn is_running(&self, today: NaiveDate) -> bool {
        self.phase(today) == RoutinePhase::Running
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Earliest task by order, which drives the daily reminder.
    pub fn first_task(&self) -> Option<&Task> {
        self.tasks.iter().min_by_key(|t| t.order_index)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn day_mut(&mut self, date: NaiveDate) -> Option<&mut DayRecord> {
        self.days.iter_mut().find(|d| d.date == date)
    }

    /// Get-or-create the record for `date`. Never creates a second record for
    /// the same day.
    pub fn day_or_insert(&mut self, date: NaiveDate) -> &mut DayRecord {
        let index = match self.days.iter().position(|d| d.date == date) {
            Some(index) => index,
            None => {
                self.days.push(DayRecord::new(date));
                self.days.len() - 1
            }
        };
        &mut self.days[index]
    }

    /// Reset every live completion flag for a fresh day.
    pub fn clear_live_flags(&mut self) {
        for task in &mut self.tasks {
            task.is_completed_today = false;
        }
    }

    pub fn next_order_index(&self) -> u32 {
        self.tasks
            .iter()
            .map(|t| t.order_index + 1)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn sort_tasks(&mut self) {
        self.tasks.sort_by_key(|t| (t.order_index, t.time));
    }
}

/// One scheduled step of a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub routine_id: RoutineId,
    pub title: String,
    /// Time of day; the date part is irrelevant.
    pub time: NaiveTime,
    pub order_index: u32,
    /// Mirrors today's completion row; reset on every rollover.
    #[serde(default)]
    pub is_completed_today: bool,
}

/// Whether a day can still change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    /// Today, still taking toggles. Missing rows mean "untouched".
    Live,
    /// Snapshot taken. Missing rows mean "incomplete".
    Finalized,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DayStatus::Live => "live",
            DayStatus::Finalized => "finalized",
        }
    }
}

impl FromStr for DayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(DayStatus::Live),
            "finalized" => Ok(DayStatus::Finalized),
            other => Err(format!("unknown day status: {other}")),
        }
    }
}

/// The result of one routine on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub id: DayRecordId,
    pub date: NaiveDate,
    pub completed_count: u32,
    pub status: DayStatus,
    pub completions: Vec<TaskCompletion>,
}

impl DayRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: DayRecordId::new(),
            date,
            completed_count: 0,
            status: DayStatus::Live,
            completions: Vec::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status == DayStatus::Finalized
    }

    pub fn completion(&self, task_id: TaskId) -> Option<&TaskCompletion> {
        self.completions.iter().find(|c| c.task_id == task_id)
    }

    /// Insert a snapshot unless one already exists for the task.
    ///
    /// Returns `true` when a row was added.
    pub fn insert_completion_if_absent(&mut self, task: &Task, state: CompletionState) -> bool {
        if self.completion(task.id).is_some() {
            return false;
        }
        self.completions.push(TaskCompletion::snapshot(task, state));
        true
    }

    /// Remove the row for a task, returning it.
    pub fn take_completion(&mut self, task_id: TaskId) -> Option<TaskCompletion> {
        let index = self.completions.iter().position(|c| c.task_id == task_id)?;
        Some(self.completions.remove(index))
    }

    /// Count of rows in the completed state.
    pub fn count_completed_rows(&self) -> u32 {
        let count = self
            .completions
            .iter()
            .filter(|c| c.state == CompletionState::Completed)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Outcome stored for one task on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionState {
    Completed,
    Incomplete,
}

impl CompletionState {
    pub fn from_flag(completed: bool) -> Self {
        if completed {
            CompletionState::Completed
        } else {
            CompletionState::Incomplete
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompletionState::Completed => "completed",
            CompletionState::Incomplete => "incomplete",
        }
    }
}

impl FromStr for CompletionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(CompletionState::Completed),
            "incomplete" => Ok(CompletionState::Incomplete),
            other => Err(format!("unknown completion state: {other}")),
        }
    }
}

/// Snapshot of a task's outcome. Title and order are copied so the row
/// survives the task being edited or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: CompletionId,
    pub task_id: TaskId,
    pub task_title: String,
    pub order_index: u32,
    pub state: CompletionState,
}

impl TaskCompletion {
    pub fn snapshot(task: &Task, state: CompletionState) -> Self {
        Self {
            id: CompletionId::new(),
            task_id: task.id,
            task_title: task.title.clone(),
            order_index: task.order_index,
            state,
        }
    }
}

/// Input for creating a routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoutine {
    pub name: String,
    pub origin: RoutineOrigin,
    #[serde(default)]
    pub tasks: Vec<NewTask>,
}

impl NewRoutine {
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: RoutineOrigin::Custom,
            tasks: Vec::new(),
        }
    }

    pub fn preset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: RoutineOrigin::Preset,
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, title: impl Into<String>, time: NaiveTime) -> Self {
        self.tasks.push(NewTask {
            title: title.into(),
            time,
        });
        self
    }
}

/// Input for adding a task to a routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub time: NaiveTime,
}
