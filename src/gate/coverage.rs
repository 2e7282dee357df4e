//! Coverage samples and the multi-environment merger.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::{QualgateError, Result};

/// Environment tag carried by merged coverage.
pub const INTEGRATED_ENVIRONMENT: &str = "integrated";

/// Percentage of `covered` over `total`, 0 when nothing is measurable.
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (covered as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// A single covered/total counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub total: u64,
    pub covered: u64,
    pub percentage: f64,
}

impl Metric {
    pub fn new(total: u64, covered: u64) -> Self {
        Self {
            total,
            covered,
            percentage: percentage(covered, total),
        }
    }
}

/// Per-file coverage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub lines_total: u64,
    pub lines_covered: u64,
    pub branches_total: u64,
    pub branches_covered: u64,
    pub functions_total: u64,
    pub functions_covered: u64,
}

/// Coverage measured in one environment (or merged across environments)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSample {
    pub environment: String,
    pub coverage_percentage: f64,
    pub line: Metric,
    pub branch: Metric,
    pub function: Metric,
    pub files: IndexMap<String, FileCoverage>,
}

impl CoverageSample {
    /// Build a sample whose aggregates are summed from `files`.
    pub fn from_files(
        environment: impl Into<String>,
        files: IndexMap<String, FileCoverage>,
    ) -> Self {
        let mut totals = FileCoverage::default();
        for file in files.values() {
            totals.lines_total += file.lines_total;
            totals.lines_covered += file.lines_covered;
            totals.branches_total += file.branches_total;
            totals.branches_covered += file.branches_covered;
            totals.functions_total += file.functions_total;
            totals.functions_covered += file.functions_covered;
        }

        let line = Metric::new(totals.lines_total, totals.lines_covered);
        Self {
            environment: environment.into(),
            coverage_percentage: line.percentage,
            line,
            branch: Metric::new(totals.branches_total, totals.branches_covered),
            function: Metric::new(totals.functions_total, totals.functions_covered),
            files,
        }
    }

    /// Explicit zero-valued sample used in place of a failed measurement.
    pub fn zeroed(environment: impl Into<String>) -> Self {
        Self::from_files(environment, IndexMap::new())
    }
}

/// Outcome of measuring the optional secondary environment.
///
/// A failed secondary measurement is an expected branch, not an error: the
/// run continues with a zero-valued sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SecondaryMeasurement {
    /// The run mode does not measure a secondary environment
    Skipped,
    /// Measured successfully
    Measured(CoverageSample),
    /// Measurement failed; `sample` is the zero-valued stand-in
    Degraded {
        sample: CoverageSample,
        reason: String,
    },
}

impl SecondaryMeasurement {
    /// Sample participating in the merge, if any
    pub fn sample(&self) -> Option<&CoverageSample> {
        match self {
            Self::Skipped => None,
            Self::Measured(sample) | Self::Degraded { sample, .. } => Some(sample),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Coverage percentage recorded in history (0 when not measured)
    pub fn coverage_percentage(&self) -> f64 {
        self.sample().map_or(0.0, |s| s.coverage_percentage)
    }
}

/// Merge primary and secondary coverage into the integrated sample.
///
/// Without a secondary sample the result borrows the primary unchanged.
/// With one, every file key present in the secondary replaces the primary's
/// record outright and the aggregates are recomputed from the merged map.
pub fn integrate<'a>(
    primary: Option<&'a CoverageSample>,
    secondary: Option<&CoverageSample>,
) -> Result<Cow<'a, CoverageSample>> {
    let primary = primary.ok_or_else(|| {
        QualgateError::measurement(
            INTEGRATED_ENVIRONMENT,
            "primary coverage data is missing",
        )
    })?;

    let Some(secondary) = secondary else {
        warn!(
            "No secondary coverage available; integrating '{}' only",
            primary.environment
        );
        return Ok(Cow::Borrowed(primary));
    };

    let mut files = primary.files.clone();
    for (path, record) in &secondary.files {
        files.insert(path.clone(), *record);
    }

    Ok(Cow::Owned(CoverageSample::from_files(
        INTEGRATED_ENVIRONMENT,
        files,
    )))
}
