mod config;
pub mod memory;
pub mod migrations;
pub mod routine_db;

pub use config::{Config, NotificationsConfig, WeekConfig};
pub use memory::MemoryBackend;
pub use routine_db::RoutineDb;

use std::path::PathBuf;

use crate::error::{ConfigError, DatabaseError};
use crate::store::{EntityStore, Snapshot};

/// Durable home for the entity store.
///
/// `save` is called once per top-level operation. It writes every routine in
/// the store and applies the store's tombstones; the caller clears the
/// tombstones only after it succeeds.
pub trait Persistence {
    fn load(&mut self) -> Result<Snapshot, DatabaseError>;
    fn save(&mut self, store: &EntityStore) -> Result<(), DatabaseError>;
}

/// Returns `~/.config/routinely[-dev]/` based on ROUTINELY_ENV.
///
/// Set ROUTINELY_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ROUTINELY_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("routinely-dev")
    } else {
        base_dir.join("routinely")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
