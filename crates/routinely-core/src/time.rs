//! Calendar-day normalization and the injectable clock.
//!
//! Every "is this today?" question in the crate goes through [`day_key`].
//! Raw timestamps are never compared for day equality: a check that runs at
//! 23:59 and one that runs at 00:01 differ by two minutes but by a whole day.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Reduce a timestamp to its local calendar day.
pub fn day_key(timestamp: DateTime<Local>) -> NaiveDate {
    timestamp.date_naive()
}

/// Source of "now" for the engine.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        day_key(self.now())
    }

    fn yesterday(&self) -> NaiveDate {
        previous_day(self.today())
    }

    fn tomorrow(&self) -> NaiveDate {
        next_day(self.today())
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle while the
/// manager owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.lock() = now;
    }

    /// Move forward by whole calendar days, keeping the time of day.
    pub fn advance_days(&self, days: u64) {
        let mut guard = self.lock();
        if let Some(next) = guard.checked_add_days(Days::new(days)) {
            *guard = next;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Local>> {
        // A poisoned lock still holds a valid timestamp.
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.lock()
    }
}

/// First day of the displayed week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

/// Start of the week containing `date`.
pub fn week_start(date: NaiveDate, starts_on: WeekStart) -> NaiveDate {
    let offset = match starts_on {
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        WeekStart::Monday => date.weekday().num_days_from_monday(),
    };
    date.checked_sub_days(Days::new(u64::from(offset)))
        .unwrap_or(date)
}

pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

/// Drop seconds and below. Task times and reminders are minute-granular.
pub fn whole_minutes(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Shift `date` by a signed number of weeks.
pub fn add_weeks(date: NaiveDate, weeks: i64) -> NaiveDate {
    let days = Days::new(weeks.unsigned_abs().saturating_mul(7));
    let shifted = if weeks >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    };
    shifted.unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn same_day_ignores_time_of_day() {
        assert_eq!(
            day_key(local(2026, 3, 4, 0, 5)),
            day_key(local(2026, 3, 4, 23, 55))
        );
        assert_ne!(
            day_key(local(2026, 3, 4, 23, 55)),
            day_key(local(2026, 3, 5, 0, 5))
        );
    }

    #[test]
    fn clock_derives_neighbouring_days() {
        let clock = ManualClock::new(local(2026, 3, 1, 9, 0));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(clock.yesterday(), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        assert_eq!(clock.tomorrow(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(local(2026, 3, 1, 9, 0));
        let handle = clock.clone();
        handle.advance_days(2);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    }

    #[test]
    fn week_start_is_sunday_aligned_by_default() {
        // 2026-03-04 is a Wednesday.
        let wed = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        assert_eq!(
            week_start(wed, WeekStart::Sunday),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert_eq!(
            week_start(wed, WeekStart::Monday),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(week_start(sunday, WeekStart::Sunday), sunday);
    }

    #[test]
    fn add_weeks_handles_negative_offsets() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(add_weeks(start, -1), NaiveDate::from_ymd_opt(2026, 2, 22).unwrap());
        assert_eq!(add_weeks(start, 2), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn whole_minutes_drops_seconds() {
        let time = NaiveTime::from_hms_milli_opt(7, 15, 42, 250).unwrap();
        assert_eq!(whole_minutes(time), NaiveTime::from_hms_opt(7, 15, 0).unwrap());
    }
}
