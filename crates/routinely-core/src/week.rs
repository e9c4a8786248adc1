//! Seven-day completion series for the history chart.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::Routine;
use crate::time::{add_weeks, week_start, WeekStart};

/// Completed count for one day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekData {
    /// Offset actually used; positive requests are clamped to 0.
    pub week_offset: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<DayPoint>,
    /// Tasks currently on the routine, for ratio rendering.
    pub task_count: u32,
    pub can_navigate_back: bool,
    pub can_navigate_forward: bool,
    pub label: String,
}

/// Build the week `week_offset` weeks away from the one containing `today`.
pub fn week_data(
    routine: &Routine,
    today: NaiveDate,
    week_offset: i32,
    starts_on: WeekStart,
) -> WeekData {
    let week_offset = week_offset.min(0);
    let start = add_weeks(week_start(today, starts_on), i64::from(week_offset));

    let points: Vec<DayPoint> = (0..7u64)
        .filter_map(|i| start.checked_add_days(Days::new(i)))
        .map(|date| DayPoint {
            date,
            completed: routine.day(date).map_or(0, |d| d.completed_count),
        })
        .collect();
    let end = points.last().map_or(start, |p| p.date);

    let can_navigate_back = routine
        .start_date
        .is_some_and(|first| start > week_start(first, starts_on));

    WeekData {
        week_offset,
        start,
        end,
        points,
        task_count: u32::try_from(routine.tasks.len()).unwrap_or(u32::MAX),
        can_navigate_back,
        can_navigate_forward: week_offset < 0,
        label: range_label(start, end),
    }
}

/// `"Mar 2-8"` within a month, `"Mar 30-Apr 5"` across months.
pub fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    if start.month() == end.month() && start.year() == end.year() {
        format!("{} {}-{}", start.format("%b"), start.day(), end.day())
    } else {
        format!(
            "{} {}-{} {}",
            start.format("%b"),
            start.day(),
            end.format("%b"),
            end.day()
        )
    }
}
