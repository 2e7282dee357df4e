//! Bounded history of gate runs.
//!
//! The log is a JSON array rewritten in full on every append. There is no
//! file locking: two gate runs appending at the same time can lose one entry.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::errors::{QualgateError, Result};

/// One recorded gate run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    /// Integrated coverage
    pub coverage_percentage: f64,
    /// Primary environment coverage
    pub pure_coverage_percentage: f64,
    /// Secondary environment coverage (0 when not measured)
    pub secondary_env_coverage_percentage: f64,
    pub gate_passed: bool,
}

/// Append-only (from the caller's view) ledger of gate runs
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    path: PathBuf,
    max_entries: usize,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the log. A missing or unreadable log is treated as empty.
    pub fn load(&self) -> Vec<HistoryEntry> {
        if !self.path.exists() {
            return Vec::new();
        }

        let parsed = fs::read_to_string(&self.path)
            .map_err(|e| QualgateError::io("Failed to read history", e))
            .and_then(|content| serde_json::from_str(&content).map_err(QualgateError::from));

        match parsed {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "Ignoring unreadable history at {}: {}",
                    self.path.display(),
                    err
                );
                Vec::new()
            }
        }
    }

    /// Append `entry`, keep the most recent `max_entries`, rewrite the log.
    ///
    /// Returns the number of entries persisted.
    pub fn append(&self, entry: HistoryEntry) -> Result<usize> {
        let mut history = self.load();
        history.push(entry);
        truncate_to_recent(&mut history, self.max_entries);

        let content = serde_json::to_string_pretty(&history)?;
        fs::write(&self.path, content).map_err(|e| {
            QualgateError::io(
                format!("Failed to write history: {}", self.path.display()),
                e,
            )
        })?;

        info!("Recorded gate history ({} entries)", history.len());
        Ok(history.len())
    }
}

/// Drop entries from the front until at most `max_entries` remain.
pub fn truncate_to_recent<T>(entries: &mut Vec<T>, max_entries: usize) {
    if entries.len() > max_entries {
        let excess = entries.len() - max_entries;
        entries.drain(..excess);
    }
}
