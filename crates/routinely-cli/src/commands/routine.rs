//! Routine lifecycle commands for CLI.

use chrono::NaiveTime;
use clap::Subcommand;
use routinely_core::{NewRoutine, NewTask, RoutineOrigin, TaskId};
use serde::Serialize;

use super::{open_manager, print_json, resolve_routine, CliResult};

#[derive(Subcommand)]
pub enum RoutineAction {
    /// Create a routine and make it active from tomorrow
    Activate {
        /// Routine name
        name: String,
        /// Task as "HH:MM Title" (repeatable, in order)
        #[arg(long = "task")]
        tasks: Vec<String>,
        /// Origin: custom or preset (default: custom)
        #[arg(long, default_value = "custom")]
        origin: String,
    },
    /// Store a routine without activating it
    Create {
        name: String,
        #[arg(long = "task")]
        tasks: Vec<String>,
        #[arg(long, default_value = "custom")]
        origin: String,
    },
    /// List all routines
    List,
    /// Show one routine (defaults to the active routine)
    Show { id: Option<String> },
    /// Make a routine active again from tomorrow
    Restart { id: String },
    /// Retire the active routine (or the given one)
    Deactivate { id: Option<String> },
    /// Delete a routine and all of its history
    Delete { id: String },
    /// Add a task to a routine
    AddTask {
        /// Routine ID
        id: String,
        /// Time of day as HH:MM
        time: String,
        /// Task title
        title: String,
    },
    /// Remove a task by ID
    RemoveTask { task_id: String },
}

#[derive(Serialize)]
struct RoutineListing<'a> {
    id: String,
    name: &'a str,
    origin: RoutineOrigin,
    phase: routinely_core::RoutinePhase,
    start_date: Option<chrono::NaiveDate>,
    tasks: usize,
    days: usize,
}

fn parse_time(raw: &str) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|e| format!("invalid time '{raw}' (expected HH:MM): {e}").into())
}

/// Parse `"HH:MM Title"`.
fn parse_task(raw: &str) -> Result<NewTask, Box<dyn std::error::Error>> {
    let (time, title) = raw
        .trim()
        .split_once(' ')
        .ok_or_else(|| format!("invalid task '{raw}' (expected \"HH:MM Title\")"))?;
    Ok(NewTask {
        title: title.trim().to_string(),
        time: parse_time(time)?,
    })
}

fn build(name: String, tasks: &[String], origin: &str) -> Result<NewRoutine, Box<dyn std::error::Error>> {
    let origin: RoutineOrigin = origin.parse()?;
    let tasks = tasks
        .iter()
        .map(|t| parse_task(t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NewRoutine {
        name,
        origin,
        tasks,
    })
}

pub fn run(action: RoutineAction) -> CliResult {
    let mut manager = open_manager()?;

    match action {
        RoutineAction::Activate {
            name,
            tasks,
            origin,
        } => {
            let id = manager.activate(build(name, &tasks, &origin)?)?;
            println!("Routine activated: {id}");
            if let Some(start) = manager.routine(id)?.start_date {
                println!("Starts: {start}");
            }
        }
        RoutineAction::Create {
            name,
            tasks,
            origin,
        } => {
            let id = manager.create_routine(build(name, &tasks, &origin)?)?;
            println!("Routine created: {id}");
        }
        RoutineAction::List => {
            let listing: Vec<RoutineListing> = manager
                .routines()
                .iter()
                .map(|r| RoutineListing {
                    id: r.id.to_string(),
                    name: &r.name,
                    origin: r.origin,
                    phase: manager.phase(r),
                    start_date: r.start_date,
                    tasks: r.tasks.len(),
                    days: r.days.len(),
                })
                .collect();
            print_json(&listing)?;
        }
        RoutineAction::Show { id } => {
            let id = resolve_routine(&manager, id.as_deref())?;
            print_json(manager.routine(id)?)?;
        }
        RoutineAction::Restart { id } => {
            let id = id.parse()?;
            manager.restart(id)?;
            println!("Routine restarted: {id}");
        }
        RoutineAction::Deactivate { id } => {
            let id = resolve_routine(&manager, id.as_deref())?;
            manager.deactivate(id)?;
            println!("Routine deactivated: {id}");
        }
        RoutineAction::Delete { id } => {
            let summary = manager.delete(id.parse()?)?;
            println!(
                "Routine deleted ({} tasks, {} days, {} completions)",
                summary.tasks, summary.day_records, summary.completions
            );
        }
        RoutineAction::AddTask { id, time, title } => {
            let task_id = manager.add_task(
                id.parse()?,
                NewTask {
                    title,
                    time: parse_time(&time)?,
                },
            )?;
            println!("Task added: {task_id}");
        }
        RoutineAction::RemoveTask { task_id } => {
            let task_id: TaskId = task_id.parse()?;
            manager.remove_task(task_id)?;
            println!("Task removed: {task_id}");
        }
    }
    Ok(())
}
