// =============================================================================
// In-memory State Store
// =============================================================================

use anyhow::Result;
use parking_lot::RwLock;

use super::{HistoryEntry, StateSnapshot, StateStore};

/// Volatile store.  Backs dry runs and deterministic tests.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: RwLock<StateSnapshot>,
    history: RwLock<Vec<HistoryEntry>>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Start from existing state, e.g. what a file store currently holds.
    pub fn seeded(snapshot: StateSnapshot, history: Vec<HistoryEntry>) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            history: RwLock::new(history),
            fail_writes: false,
        }
    }

    /// Store whose writes always fail, leaving the seeded state untouched.
    #[cfg(test)]
    pub fn with_failing_writes(snapshot: StateSnapshot, history: Vec<HistoryEntry>) -> Self {
        Self {
            fail_writes: true,
            ..Self::seeded(snapshot, history)
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot.read().clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.read().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> StateSnapshot {
        self.snapshot()
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("memory store is read-only");
        }
        *self.snapshot.write() = snapshot.clone();
        Ok(())
    }

    fn load_history(&self) -> Vec<HistoryEntry> {
        self.history()
    }

    fn save_history(&self, entries: &[HistoryEntry]) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("memory store is read-only");
        }
        *self.history.write() = entries.to_vec();
        Ok(())
    }
}
