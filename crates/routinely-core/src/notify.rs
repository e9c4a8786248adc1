//! Daily reminder boundary.
//!
//! The engine tells a scheduler when a routine should start or stop
//! reminding; delivery is the host's business. Calls are fire-and-forget:
//! the engine logs a failure and carries on.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::RoutineId;

#[derive(Error, Debug)]
#[error("notification scheduler failed: {0}")]
pub struct NotifyError(pub String);

/// Schedules and cancels one repeating reminder per routine.
pub trait NotificationScheduler {
    fn schedule_daily(
        &mut self,
        routine_id: RoutineId,
        first_task_time: NaiveTime,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError>;

    fn cancel(&mut self, routine_id: RoutineId) -> Result<(), NotifyError>;
}

/// Drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl NotificationScheduler for NoopScheduler {
    fn schedule_daily(
        &mut self,
        _routine_id: RoutineId,
        _first_task_time: NaiveTime,
        _title: &str,
        _body: &str,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    fn cancel(&mut self, _routine_id: RoutineId) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits requests as `tracing` events; used by hosts without a real
/// notification service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogScheduler;

impl NotificationScheduler for LogScheduler {
    fn schedule_daily(
        &mut self,
        routine_id: RoutineId,
        first_task_time: NaiveTime,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            %routine_id,
            at = %first_task_time.format("%H:%M"),
            title,
            body,
            "daily reminder scheduled"
        );
        Ok(())
    }

    fn cancel(&mut self, routine_id: RoutineId) -> Result<(), NotifyError> {
        tracing::info!(%routine_id, "daily reminder cancelled");
        Ok(())
    }
}

/// A call received by [`RecordingScheduler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum NotificationCall {
    Schedule {
        routine_id: RoutineId,
        at: NaiveTime,
        title: String,
        body: String,
    },
    Cancel {
        routine_id: RoutineId,
    },
}

/// Records calls instead of delivering them. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    calls: Arc<Mutex<Vec<NotificationCall>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotificationCall> {
        lock(&self.calls).clone()
    }

    /// Record calls but report failure for each one.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    fn push(&self, call: NotificationCall) -> Result<(), NotifyError> {
        lock(&self.calls).push(call);
        if *lock(&self.failing) {
            return Err(NotifyError("scheduler offline".into()));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NotificationScheduler for RecordingScheduler {
    fn schedule_daily(
        &mut self,
        routine_id: RoutineId,
        first_task_time: NaiveTime,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        self.push(NotificationCall::Schedule {
            routine_id,
            at: first_task_time,
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    fn cancel(&mut self, routine_id: RoutineId) -> Result<(), NotifyError> {
        self.push(NotificationCall::Cancel { routine_id })
    }
}
