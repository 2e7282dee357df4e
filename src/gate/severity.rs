//! Static-analysis defect classification by severity.

use std::collections::BTreeMap;
use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

/// Defect criticality bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Classify a raw severity string. Anything other than `low` or `high`
    /// lands in the medium bucket.
    pub fn classify(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

/// Defect entry as emitted by the analyzer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDefect {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// One analyzer invocation and the defects it reported.
///
/// `defects` is required so that arbitrary JSON objects are not mistaken for
/// an empty run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolRun {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    pub defects: Vec<RawDefect>,
}

/// A classified defect that survived exclusion filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectRecord {
    pub severity: Severity,
    pub file: String,
}

/// Per-severity defect counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeverityCounts {
    pub fn increment(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low
    }
}

/// Global counts plus a per-file breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTotals {
    pub totals: SeverityCounts,
    pub by_file: BTreeMap<String, SeverityCounts>,
}

impl SeverityTotals {
    pub fn record(&mut self, defect: &DefectRecord) {
        self.totals.increment(defect.severity);
        self.by_file
            .entry(defect.file.clone())
            .or_default()
            .increment(defect.severity);
    }
}

/// Use `/` as the separator regardless of the platform that produced the path.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Path-exclusion filter. Each pattern is tried as given and with a `**/`
/// prefix, so `lib/**` matches both `lib/a.cpp` and `/abs/project/lib/a.cpp`.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    set: GlobSet,
}

impl ExclusionMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder.add(Glob::new(pattern)?);
            if !pattern.starts_with("**/") {
                builder.add(Glob::new(&format!("**/{pattern}"))?);
            }
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.set.is_match(normalize_path(path))
    }
}

/// Classify every defect across all tool runs.
///
/// Defects without a file path, or whose path is excluded, are dropped.
pub fn classify_defects(runs: &[ToolRun], exclusions: &ExclusionMatcher) -> SeverityTotals {
    let mut totals = SeverityTotals::default();

    for run in runs {
        for defect in &run.defects {
            let Some(file) = defect.file.as_deref().filter(|f| !f.is_empty()) else {
                continue;
            };
            if exclusions.is_excluded(file) {
                continue;
            }
            let record = DefectRecord {
                severity: Severity::classify(defect.severity.as_deref().unwrap_or_default()),
                file: normalize_path(file),
            };
            totals.record(&record);
        }
    }

    totals
}
