//! # Routinely Core Library
//!
//! This library tracks a user's progress through one active daily routine.
//! It keeps exactly one routine active, seals each day's results into
//! history when the calendar day rolls over, tracks per-task completion for
//! the live day, and rebuilds weekly completion series for display.
//!
//! ## Architecture
//!
//! - **Lifecycle**: [`RoutineManager`] is an explicit context that owns the
//!   entity store, the persistence backend, the clock and the notification
//!   scheduler. Every mutation goes through it.
//! - **Storage**: an in-memory arena ([`EntityStore`]) written out through
//!   the [`Persistence`] trait, with a SQLite backend ([`RoutineDb`]) and a
//!   TOML [`Config`]
//! - **Completion**: mechanical toggle and lookup for a single day
//! - **Week**: seven-day series (Sunday-aligned by default) with navigation bounds
//!
//! Day rollover is trigger-based: the host calls
//! [`RoutineManager::perform_midnight_check`] on foreground. There is no
//! background timer.

pub mod completion;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod storage;
pub mod store;
pub mod time;
pub mod week;

pub use completion::{DaySummary, TaskOutcome, TaskOutcomeRow, ToggleOutcome};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use lifecycle::{FinalizeSummary, MidnightOutcome, RoutineManager};
pub use model::{
    CompletionState, DayRecord, DayStatus, NewRoutine, NewTask, Routine, RoutineId,
    RoutineOrigin, RoutinePhase, Task, TaskCompletion, TaskId,
};
pub use notify::{LogScheduler, NoopScheduler, NotificationScheduler, RecordingScheduler};
pub use storage::{Config, MemoryBackend, Persistence, RoutineDb};
pub use store::{CascadeSummary, EntityStore, Snapshot};
pub use time::{day_key, Clock, ManualClock, SystemClock, WeekStart};
pub use week::{DayPoint, WeekData};
