// =============================================================================
// JSON File Store — snapshot + history persisted as JSON documents
// =============================================================================
//
//   sentiment_state.json   { "drivers": { name: value, ... }, "timestamp": "..." }
//   history.json           { "points": [ HistoryEntry, ... ] }
//
// Writes go through a `.tmp` sibling followed by a rename so a crash
// mid-write never leaves a truncated document behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{HistoryEntry, StateSnapshot, StateStore};

/// Serialise `value` as pretty JSON and write it to `path` atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialise JSON for {}", path.display()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");

    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write tmp file {}", tmp_path.display()))?;

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename tmp file to {}", path.display()))?;

    Ok(())
}

/// Read and parse a JSON document.  `Ok(None)` when the file does not exist.
fn read_json(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

#[derive(Serialize)]
struct HistoryDocument<'a> {
    points: &'a [HistoryEntry],
}

#[derive(Deserialize)]
struct RawHistoryDocument {
    #[serde(default)]
    points: Vec<Value>,
}

/// File-backed store used by the binary.
pub struct JsonFileStore {
    state_path: PathBuf,
    history_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(state_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            history_path: history_path.into(),
        }
    }

    fn try_load(&self) -> Result<Option<StateSnapshot>> {
        match read_json(&self.state_path)? {
            Some(value) => {
                let snap = serde_json::from_value(value).with_context(|| {
                    format!("unexpected state layout in {}", self.state_path.display())
                })?;
                Ok(Some(snap))
            }
            None => Ok(None),
        }
    }

    fn try_load_history(&self) -> Result<Vec<HistoryEntry>> {
        let Some(value) = read_json(&self.history_path)? else {
            return Ok(Vec::new());
        };
        let doc: RawHistoryDocument = serde_json::from_value(value).with_context(|| {
            format!("unexpected history layout in {}", self.history_path.display())
        })?;

        let total = doc.points.len();
        let entries: Vec<HistoryEntry> = doc
            .points
            .into_iter()
            .filter_map(|p| serde_json::from_value(p).ok())
            .collect();

        if entries.len() < total {
            warn!(
                path = %self.history_path.display(),
                dropped = total - entries.len(),
                "skipped malformed history points"
            );
        }
        Ok(entries)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> StateSnapshot {
        match self.try_load() {
            Ok(Some(snap)) => {
                debug!(path = %self.state_path.display(), drivers = snap.drivers.len(), "state snapshot loaded");
                snap
            }
            Ok(None) => {
                info!(path = %self.state_path.display(), "no previous state, starting fresh");
                StateSnapshot::default()
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to load state snapshot, starting fresh");
                StateSnapshot::default()
            }
        }
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        write_json_atomic(&self.state_path, snapshot)?;
        debug!(path = %self.state_path.display(), "state snapshot saved (atomic)");
        Ok(())
    }

    fn load_history(&self) -> Vec<HistoryEntry> {
        match self.try_load_history() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to load history, starting empty");
                Vec::new()
            }
        }
    }

    fn save_history(&self, entries: &[HistoryEntry]) -> Result<()> {
        write_json_atomic(&self.history_path, &HistoryDocument { points: entries })?;
        debug!(path = %self.history_path.display(), points = entries.len(), "history saved (atomic)");
        Ok(())
    }
}
