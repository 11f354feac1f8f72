//! History of persisted merges
//!
//! Each successful write of a merged file can be recorded with its change log.

use crate::error::{Error, Result};
use crate::merge::ChangeLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A record of one persisted merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the merge was written
    pub timestamp: DateTime<Utc>,
    /// Command that produced it, e.g. `text-merge`
    pub operation: String,
    /// File name of the merged target
    pub target: String,
    /// Path that was written
    pub output: PathBuf,
    /// Changes made
    pub changes: ChangeLog,
}

/// History file containing all recorded merges
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryFile {
    /// History entries grouped by target name
    pub entries: HashMap<String, Vec<HistoryEntry>>,
}

impl HistoryFile {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Load history from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save history to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn add_entry(&mut self, entry: HistoryEntry) {
        self.entries
            .entry(entry.target.clone())
            .or_default()
            .push(entry);
    }

    pub fn get_target_history(&self, target: &str) -> Option<&Vec<HistoryEntry>> {
        self.entries.get(target)
    }

    pub fn get_last_entry(&self, target: &str) -> Option<&HistoryEntry> {
        self.entries.get(target).and_then(|v| v.last())
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    /// Entries for one target, or for every target, oldest first
    pub fn entries_for(&self, target: Option<&str>) -> Vec<&HistoryEntry> {
        let mut entries: Vec<&HistoryEntry> = match target {
            Some(target) => self
                .get_target_history(target)
                .map(|v| v.iter().collect())
                .unwrap_or_default(),
            None => self.entries.values().flatten().collect(),
        };
        entries.sort_by_key(|e| e.timestamp);
        entries
    }
}

/// Create a history entry for a merge that was just written
pub fn create_history_entry(
    operation: &str,
    target: &str,
    output: PathBuf,
    changes: ChangeLog,
) -> HistoryEntry {
    HistoryEntry {
        timestamp: Utc::now(),
        operation: operation.to_string(),
        target: target.to_string(),
        output,
        changes,
    }
}

/// Append an entry to the history file at `path`
pub fn record<P: AsRef<Path>>(path: P, entry: HistoryEntry) -> Result<()> {
    let path = path.as_ref();
    let mut history = HistoryFile::load(path)?;
    history.add_entry(entry);
    history.save(path)
}
