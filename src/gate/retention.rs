//! Age and count based retention of rendered reports.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::errors::{QualgateError, Result};

/// A report file found in the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub created_time: DateTime<Local>,
    pub size_bytes: u64,
}

impl ReportArtifact {
    /// Read an artifact's metadata. Falls back to the modification time on
    /// filesystems that do not record creation time.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| {
            QualgateError::io(format!("Failed to stat {}", path.display()), e)
        })?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map_err(|e| {
                QualgateError::io(format!("No timestamp for {}", path.display()), e)
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            created_time: DateTime::<Local>::from(created),
            size_bytes: metadata.len(),
        })
    }

    /// Whole days elapsed since creation
    pub fn age_days(&self, now: DateTime<Local>) -> i64 {
        (now - self.created_time).num_days()
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Which reports survive a cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Reports older than this are deleted; 0 deletes every report
    pub keep_days: u32,
    /// Cap on remaining reports; 0 means no cap
    pub max_files: usize,
}

impl RetentionPolicy {
    pub fn is_expired(&self, artifact: &ReportArtifact, now: DateTime<Local>) -> bool {
        self.keep_days == 0 || artifact.age_days(now) > i64::from(self.keep_days)
    }

    /// Oldest reports beyond the count cap. `remaining` must be sorted oldest
    /// first.
    pub fn excess<'a>(&self, remaining: &'a [ReportArtifact]) -> &'a [ReportArtifact] {
        if self.max_files > 0 && remaining.len() > self.max_files {
            &remaining[..remaining.len() - self.max_files]
        } else {
            &[]
        }
    }
}

/// Result of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub deleted_files: usize,
    pub deleted_bytes: u64,
    pub failed_deletions: usize,
    pub remaining_files: usize,
}

/// Report directory statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub html_files: usize,
    pub xml_files: usize,
    pub json_files: usize,
    pub oldest_file_days: i64,
    pub newest_file_days: i64,
}

/// Prunes the report output directory
#[derive(Debug, Clone)]
pub struct RetentionManager {
    output_dir: PathBuf,
}

impl RetentionManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// List regular files in the output directory, oldest first.
    pub fn scan(&self) -> Result<Vec<ReportArtifact>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.output_dir).map_err(|e| {
            QualgateError::io(
                format!("Failed to list {}", self.output_dir.display()),
                e,
            )
        })?;

        Ok(collect_artifacts(
            &self.output_dir,
            entries.map(|entry| entry.map(|entry| entry.path())),
        ))
    }

    /// Apply `policy` using the current time.
    pub fn clean(&self, policy: RetentionPolicy) -> Result<CleanupSummary> {
        self.clean_at(policy, Local::now())
    }

    /// Apply `policy` as of `now`. Deletion failures are logged and skipped.
    pub fn clean_at(&self, policy: RetentionPolicy, now: DateTime<Local>) -> Result<CleanupSummary> {
        if !self.output_dir.exists() {
            info!(
                "Report directory does not exist: {}",
                self.output_dir.display()
            );
            return Ok(CleanupSummary::default());
        }

        info!(
            "Cleaning reports: keep_days={}, max_files={}",
            policy.keep_days, policy.max_files
        );

        let mut summary = CleanupSummary::default();
        let mut remaining = Vec::new();

        for artifact in self.scan()? {
            if policy.is_expired(&artifact, now) {
                if self.delete(&artifact, &mut summary) {
                    debug!(
                        "Deleted expired report {} ({} days old)",
                        artifact.file_name(),
                        artifact.age_days(now)
                    );
                    continue;
                }
            }
            remaining.push(artifact);
        }

        let excess = policy.excess(&remaining);
        let mut deleted_for_cap = 0;
        for artifact in excess {
            if self.delete(artifact, &mut summary) {
                deleted_for_cap += 1;
                debug!("Deleted report over file limit: {}", artifact.file_name());
            }
        }
        summary.remaining_files = remaining.len() - deleted_for_cap;

        if summary.deleted_files > 0 {
            info!(
                "Cleanup finished: {} files deleted, {:.1}MB freed",
                summary.deleted_files,
                summary.deleted_bytes as f64 / (1024.0 * 1024.0)
            );
        } else {
            info!("No reports needed deleting");
        }

        Ok(summary)
    }

    fn delete(&self, artifact: &ReportArtifact, summary: &mut CleanupSummary) -> bool {
        match fs::remove_file(&artifact.path) {
            Ok(()) => {
                summary.deleted_files += 1;
                summary.deleted_bytes += artifact.size_bytes;
                true
            }
            Err(err) => {
                warn!("Failed to delete {}: {}", artifact.path.display(), err);
                summary.failed_deletions += 1;
                false
            }
        }
    }

    /// Summarise the report directory. A missing directory yields zeros.
    pub fn stats(&self) -> Result<ReportStats> {
        let now = Local::now();
        let artifacts = self.scan()?;

        let mut stats = ReportStats {
            total_files: artifacts.len(),
            ..ReportStats::default()
        };

        for artifact in &artifacts {
            stats.total_size_bytes += artifact.size_bytes;
            match artifact.path.extension().and_then(|ext| ext.to_str()) {
                Some("html") => stats.html_files += 1,
                Some("xml") => stats.xml_files += 1,
                Some("json") => stats.json_files += 1,
                _ => {}
            }
        }

        let ages = artifacts.iter().map(|a| a.age_days(now));
        stats.oldest_file_days = ages.clone().max().unwrap_or(0);
        stats.newest_file_days = ages.min().unwrap_or(0);

        Ok(stats)
    }
}

/// Regular files among `entries`, oldest first. Unreadable entries are
/// logged and skipped.
fn collect_artifacts(
    dir: &Path,
    entries: impl Iterator<Item = io::Result<PathBuf>>,
) -> Vec<ReportArtifact> {
    let mut artifacts = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match ReportArtifact::from_path(&path) {
            Ok(artifact) => artifacts.push(artifact),
            Err(err) => warn!("Skipping {}: {}", path.display(), err),
        }
    }

    artifacts.sort_by(|a, b| a.created_time.cmp(&b.created_time));
    artifacts
}
