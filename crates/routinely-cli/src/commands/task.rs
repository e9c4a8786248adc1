use chrono::NaiveDate;
use clap::Subcommand;
use routinely_core::TaskId;

use super::{open_manager, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Toggle a task's completion for today
    Toggle {
        /// Task ID
        id: String,
    },
    /// Whether a task was completed on a date
    Status {
        /// Task ID
        id: String,
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    let mut manager = open_manager()?;

    match action {
        TaskAction::Toggle { id } => {
            let task_id: TaskId = id.parse()?;
            let outcome = manager.toggle_task(task_id)?;
            let state = if outcome.completed { "completed" } else { "not completed" };
            println!("Task {task_id}: {state} ({} done today)", outcome.completed_count);
        }
        TaskAction::Status { id, date } => {
            let task_id: TaskId = id.parse()?;
            let date = match date {
                Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
                None => manager.today(),
            };
            println!("{}", manager.is_task_completed(task_id, date));
        }
    }
    Ok(())
}
