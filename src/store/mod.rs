// =============================================================================
// State Store Module
// =============================================================================
//
// Persistence boundary of the engine.  Two pieces of state survive between
// runs:
//
//   - the current StateSnapshot (last value per driver, overwritten each run)
//   - the HistoryLog (append-only, bounded FIFO of aggregate + driver values)
//
// Reads are fail-soft: a missing, unreadable or malformed backend yields an
// empty snapshot / empty history.  Writes report errors so the caller can
// log them; they never abort a run.

pub mod json_file;
pub mod memory;

pub use json_file::{write_json_atomic, JsonFileStore};
pub use memory::MemoryStore;

use std::collections::{BTreeMap, VecDeque};

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::DriverKind;

/// Default retention of the history log.
pub const MAX_HISTORY_POINTS: usize = 200;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Last known value per driver.  Values are kept as raw JSON so that a
/// hand-edited or corrupted entry only invalidates that one driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub drivers: BTreeMap<String, Value>,

    /// RFC 3339 time the snapshot was recorded.  Anything other than a
    /// string reads as absent.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.as_str().map(str::to_string)))
}

impl StateSnapshot {
    pub fn new(values: &BTreeMap<DriverKind, u8>, timestamp: impl Into<String>) -> Self {
        Self {
            drivers: values
                .iter()
                .map(|(kind, v)| (kind.name().to_string(), Value::from(*v)))
                .collect(),
            timestamp: Some(timestamp.into()),
        }
    }

    /// Previous numeric value of `name`, if one was recorded.
    pub fn previous_value(&self, name: &str) -> Option<f64> {
        self.drivers
            .get(name)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One point of the sentiment time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub total: u8,
    pub drivers: BTreeMap<String, u8>,
}

impl HistoryEntry {
    pub fn new(timestamp: impl Into<String>, total: u8, values: &BTreeMap<DriverKind, u8>) -> Self {
        Self {
            timestamp: timestamp.into(),
            total,
            drivers: values
                .iter()
                .map(|(kind, v)| (kind.name().to_string(), *v))
                .collect(),
        }
    }
}

/// Bounded FIFO of history entries, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    points: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryLog {
    /// Create an empty log.  A capacity of zero is raised to one so the
    /// latest run is always retained.  Storage grows with the entries,
    /// never with `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild a log from persisted entries, keeping only the newest
    /// `capacity` of them.
    pub fn from_entries(entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        log.points.extend(entries);
        log.trim();
        log
    }

    /// Append `entry` and evict from the front until within capacity.
    /// Returns the number of evicted entries.
    pub fn push(&mut self, entry: HistoryEntry) -> usize {
        self.points.push_back(entry);
        self.trim()
    }

    fn trim(&mut self) -> usize {
        let excess = self.points.len().saturating_sub(self.capacity);
        self.points.drain(..excess);
        excess
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Abstract persistence for the snapshot and the history log.
pub trait StateStore {
    /// Current snapshot, or an empty one if nothing usable is stored.
    fn load(&self) -> StateSnapshot;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &StateSnapshot) -> Result<()>;

    /// Stored history, oldest first; empty if nothing usable is stored.
    fn load_history(&self) -> Vec<HistoryEntry>;

    /// Replace the stored history with `entries` (already truncated).
    fn save_history(&self, entries: &[HistoryEntry]) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn entry(n: u8) -> HistoryEntry {
    HistoryEntry {
        timestamp: format!("2026-01-01T00:{:02}:00+00:00", n % 60),
        total: n % 101,
        drivers: BTreeMap::from([("news".to_string(), n % 101)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn previous_value_ignores_non_numeric() {
        let snap: StateSnapshot = serde_json::from_value(json!({
            "drivers": { "fear_greed": 40, "news": "high", "social": null, "on_chain": 61.5 },
            "timestamp": "2026-01-01T00:00:00"
        }))
        .unwrap();
        assert_eq!(snap.previous_value("fear_greed"), Some(40.0));
        assert_eq!(snap.previous_value("on_chain"), Some(61.5));
        assert_eq!(snap.previous_value("news"), None);
        assert_eq!(snap.previous_value("social"), None);
        assert_eq!(snap.previous_value("liquidity"), None);
    }

    #[test]
    fn non_string_timestamp_keeps_driver_values() {
        for timestamp in [json!(12345), json!({ "at": "noon" }), json!(null)] {
            let snap: StateSnapshot = serde_json::from_value(json!({
                "drivers": { "fear_greed": 40, "news": 58 },
                "timestamp": timestamp
            }))
            .unwrap();
            assert_eq!(snap.previous_value("fear_greed"), Some(40.0));
            assert_eq!(snap.previous_value("news"), Some(58.0));
            assert!(snap.timestamp.is_none());
        }
    }

    #[test]
    fn snapshot_without_drivers_is_empty() {
        let snap: StateSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snap.is_empty());
        assert!(snap.timestamp.is_none());
    }

    #[test]
    fn snapshot_from_values_uses_stable_names() {
        let values = BTreeMap::from([(DriverKind::FearGreed, 55u8), (DriverKind::OnChain, 47u8)]);
        let snap = StateSnapshot::new(&values, "2026-10-17T00:00:00+00:00");
        assert_eq!(snap.previous_value("fear_greed"), Some(55.0));
        assert_eq!(snap.previous_value("on_chain"), Some(47.0));
    }

    #[test]
    fn history_push_evicts_oldest_first() {
        let entries: Vec<HistoryEntry> = (0..200).map(entry).collect();
        let mut log = HistoryLog::from_entries(entries.clone(), MAX_HISTORY_POINTS);
        assert_eq!(log.len(), 200);

        let evicted = log.push(entry(200));
        assert_eq!(evicted, 1);
        assert_eq!(log.len(), 200);
        assert_eq!(log.iter().next(), Some(&entries[1]));
        assert_eq!(log.iter().last(), Some(&entry(200)));
    }

    #[test]
    fn oversized_history_is_truncated_on_load() {
        let entries: Vec<HistoryEntry> = (0..250).map(entry).collect();
        let log = HistoryLog::from_entries(entries.clone(), 200);
        assert_eq!(log.len(), 200);
        assert_eq!(log.to_vec()[0], entries[50]);
    }

    #[test]
    fn zero_capacity_still_keeps_latest() {
        let mut log = HistoryLog::new(0);
        log.push(entry(1));
        log.push(entry(2));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.to_vec(), vec![entry(2)]);
    }

    #[test]
    fn unbounded_capacity_grows_with_entries() {
        let entries: Vec<HistoryEntry> = (0..5).map(entry).collect();
        let mut log = HistoryLog::from_entries(entries, usize::MAX);
        assert_eq!(log.capacity(), usize::MAX);

        assert_eq!(log.push(entry(5)), 0);
        assert_eq!(log.len(), 6);
        assert_eq!(log.iter().last(), Some(&entry(5)));

        let mut large = HistoryLog::new(10_000_000_000);
        large.push(entry(1));
        assert_eq!(large.to_vec(), vec![entry(1)]);
    }
}
