pub mod config;
pub mod history;
pub mod routine;
pub mod task;

use routinely_core::{Config, LogScheduler, RoutineDb, RoutineId, RoutineManager, SystemClock};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the manager over the on-disk database with the wall clock.
pub fn connect() -> Result<RoutineManager, Box<dyn std::error::Error>> {
    tracing::debug!("opening routine database");
    let manager = RoutineManager::new(
        Box::new(RoutineDb::open()?),
        Box::new(SystemClock),
        Box::new(LogScheduler),
        Config::load_or_default(),
    )?;
    Ok(manager)
}

/// Open the manager and roll the active routine over to today.
///
/// Every invocation is a fresh start of the app, so the day check runs
/// before any command reads or changes routine state.
pub fn open_manager() -> Result<RoutineManager, Box<dyn std::error::Error>> {
    let mut manager = connect()?;
    let outcome = manager.perform_midnight_check()?;
    tracing::debug!(?outcome, "startup day check");
    Ok(manager)
}

/// Parse an explicit routine ID or fall back to the active routine.
pub fn resolve_routine(
    manager: &RoutineManager,
    id: Option<&str>,
) -> Result<RoutineId, Box<dyn std::error::Error>> {
    match id {
        Some(raw) => Ok(raw.parse()?),
        None => manager
            .active_routine()
            .map(|r| r.id)
            .ok_or_else(|| routinely_core::CoreError::NoActiveRoutine.into()),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
