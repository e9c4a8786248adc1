//! Volatile backend for tests and throwaway sessions.

use std::sync::{Arc, Mutex, MutexGuard};

use super::Persistence;
use crate::error::DatabaseError;
use crate::store::{EntityStore, Snapshot};

#[derive(Debug, Default)]
struct Inner {
    snapshot: Snapshot,
    fail_saves: bool,
    saves: usize,
}

/// Keeps the last saved snapshot in memory.
///
/// Clones share state, so a test can hold a handle to flip
/// [`MemoryBackend::fail_saves`] after handing the backend to a manager.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail until turned off again.
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Last successfully saved state.
    pub fn saved(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Persistence for MemoryBackend {
    fn load(&mut self) -> Result<Snapshot, DatabaseError> {
        Ok(self.lock().snapshot.clone())
    }

    fn save(&mut self, store: &EntityStore) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(DatabaseError::WriteRejected(
                "memory backend configured to fail".into(),
            ));
        }
        inner.snapshot = store.snapshot();
        inner.saves += 1;
        Ok(())
    }
}
