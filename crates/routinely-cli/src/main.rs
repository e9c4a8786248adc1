use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "routinely-cli", version, about = "Routinely CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Routine lifecycle: activate, restart, retire, delete
    Routine {
        #[command(subcommand)]
        action: commands::routine::RoutineAction,
    },
    /// Task completion for today
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Roll the active routine over to today (safe to run repeatedly)
    Check,
    /// Weekly completion series for a routine
    Week {
        /// Weeks back from the current one (0 or negative)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset: i32,
        /// Routine ID (defaults to the active routine)
        #[arg(long)]
        routine: Option<String>,
    },
    /// Per-task outcomes for one day
    Day {
        /// Date as YYYY-MM-DD (defaults to today)
        date: Option<String>,
        /// Routine ID (defaults to the active routine)
        #[arg(long)]
        routine: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("routinely_core=info,routinely_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Routine { action } => commands::routine::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::Check => commands::history::check(),
        Commands::Week { offset, routine } => commands::history::week(offset, routine),
        Commands::Day { date, routine } => commands::history::day(date, routine),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "routinely-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
