//! Rollover and read-only history views.

use chrono::NaiveDate;

use super::{connect, open_manager, print_json, resolve_routine, CliResult};

pub fn check() -> CliResult {
    let mut manager = connect()?;
    let outcome = manager.perform_midnight_check()?;
    print_json(&outcome)
}

pub fn week(offset: i32, routine: Option<String>) -> CliResult {
    let manager = open_manager()?;
    let id = resolve_routine(&manager, routine.as_deref())?;
    let week = manager.week_data(id, offset)?;

    println!("{}", week.label);
    for point in &week.points {
        println!(
            "  {} {:>3}/{}",
            point.date.format("%a %d"),
            point.completed,
            week.task_count
        );
    }
    let mut hints = Vec::new();
    if week.can_navigate_back {
        hints.push(format!("--offset {}", week.week_offset - 1));
    }
    if week.can_navigate_forward {
        hints.push(format!("--offset {}", week.week_offset + 1));
    }
    if !hints.is_empty() {
        println!("More: {}", hints.join(", "));
    }
    Ok(())
}

pub fn day(date: Option<String>, routine: Option<String>) -> CliResult {
    let manager = open_manager()?;
    let id = resolve_routine(&manager, routine.as_deref())?;
    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
        None => manager.today(),
    };
    print_json(&manager.day_outcomes(id, date)?)
}
