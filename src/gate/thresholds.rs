//! Threshold evaluation for the coverage and static-analysis gates.
//!
//! Both evaluators are plain comparisons: coverage passes when the integrated
//! percentage is at least the threshold, each severity passes when its count
//! is at most the effective limit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::{SeverityThresholds, STRICT_COVERAGE_THRESHOLD};
use crate::gate::coverage::CoverageSample;
use crate::gate::severity::{SeverityCounts, SeverityTotals};

/// Coverage threshold used when none is configured.
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 80.0;

/// Medium-severity slack used when none is configured.
pub const DEFAULT_AUTO_MEDIUM_MARGIN: i64 = 5;

/// Verdict of the coverage gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageVerdict {
    pub passed: bool,
    /// Threshold in force for this run
    pub threshold: f64,
    /// Threshold from configuration, before strict mode
    pub configured_threshold: f64,
    pub actual_coverage: f64,
    pub strict_mode: bool,
    pub environment: String,
    pub tool: String,
}

impl CoverageVerdict {
    pub fn message(&self) -> String {
        format!(
            "Coverage {:.1}% {} (threshold: {}%, {} mode)",
            self.actual_coverage,
            if self.passed { "met" } else { "not met" },
            self.threshold,
            if self.strict_mode { "strict" } else { "normal" }
        )
    }
}

/// Evaluate integrated coverage against the configured threshold.
pub fn evaluate_coverage(
    integrated: &CoverageSample,
    strict_mode: bool,
    configured_threshold: Option<f64>,
    tool: &str,
) -> CoverageVerdict {
    let configured = configured_threshold.unwrap_or(DEFAULT_COVERAGE_THRESHOLD);
    let threshold = if strict_mode {
        STRICT_COVERAGE_THRESHOLD
    } else {
        configured
    };

    CoverageVerdict {
        passed: integrated.coverage_percentage >= threshold,
        threshold,
        configured_threshold: configured,
        actual_coverage: integrated.coverage_percentage,
        strict_mode,
        environment: integrated.environment.clone(),
        tool: tool.to_string(),
    }
}

/// Thresholds actually enforced for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveThresholds {
    pub high: u64,
    pub medium: u64,
    /// `None` means low severity never gates
    pub low: Option<u64>,
}

impl EffectiveThresholds {
    /// Derive the enforced limits from configuration and current totals.
    ///
    /// Without a configured medium limit the gate is calibrated to the current
    /// run: `totals.medium + margin`, so medium defects alone cannot fail it.
    pub fn derive(
        configured: &SeverityThresholds,
        totals: &SeverityCounts,
        auto_medium_margin: i64,
    ) -> Self {
        let margin = u64::try_from(auto_medium_margin.max(0)).unwrap_or_default();
        Self {
            high: configured.high.unwrap_or(0),
            medium: configured.medium.unwrap_or(totals.medium + margin),
            low: configured.low,
        }
    }
}

/// Verdict of the static-analysis gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAnalysisVerdict {
    pub tool: String,
    pub environment: String,
    pub totals: SeverityCounts,
    pub thresholds: SeverityThresholds,
    pub effective_thresholds: EffectiveThresholds,
    pub passed: bool,
    pub by_file: BTreeMap<String, SeverityCounts>,
}

/// Evaluate classified defects against the configured thresholds.
pub fn evaluate_static_analysis(
    severity: SeverityTotals,
    thresholds: SeverityThresholds,
    auto_medium_margin: i64,
    environment: &str,
    tool: &str,
) -> StaticAnalysisVerdict {
    let totals = severity.totals;
    let effective = EffectiveThresholds::derive(&thresholds, &totals, auto_medium_margin);

    let high_ok = totals.high <= effective.high;
    let medium_ok = totals.medium <= effective.medium;
    let low_ok = effective.low.map_or(true, |limit| totals.low <= limit);

    StaticAnalysisVerdict {
        tool: tool.to_string(),
        environment: environment.to_string(),
        totals,
        thresholds,
        effective_thresholds: effective,
        passed: high_ok && medium_ok && low_ok,
        by_file: severity.by_file,
    }
}

/// Overall gate outcome: both signals must pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedVerdict {
    pub passed: bool,
    pub coverage: CoverageVerdict,
    pub static_analysis: StaticAnalysisVerdict,
}

impl CombinedVerdict {
    pub fn new(coverage: CoverageVerdict, static_analysis: StaticAnalysisVerdict) -> Self {
        Self {
            passed: coverage.passed && static_analysis.passed,
            coverage,
            static_analysis,
        }
    }

    /// Process exit code for the verdict
    pub fn exit_code(&self) -> i32 {
        if self.passed {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::coverage::FileCoverage;
    use indexmap::IndexMap;

    fn sample_with(lines_total: u64, lines_covered: u64) -> CoverageSample {
        let mut files = IndexMap::new();
        files.insert(
            "src/alarm.cpp".to_string(),
            FileCoverage {
                lines_total,
                lines_covered,
                ..FileCoverage::default()
            },
        );
        CoverageSample::from_files("integrated", files)
    }

    fn counts(high: u64, medium: u64, low: u64) -> SeverityTotals {
        SeverityTotals {
            totals: SeverityCounts { high, medium, low },
            by_file: BTreeMap::new(),
        }
    }

    #[test]
    fn coverage_at_threshold_passes() {
        let verdict = evaluate_coverage(&sample_with(100, 80), false, Some(80.0), "gcovr");
        assert!(verdict.passed);
        assert_eq!(verdict.threshold, 80.0);

        let verdict = evaluate_coverage(&sample_with(100, 79), false, Some(80.0), "gcovr");
        assert!(!verdict.passed);
    }

    #[test]
    fn coverage_threshold_defaults_to_eighty() {
        let verdict = evaluate_coverage(&sample_with(10, 8), false, None, "gcovr");
        assert_eq!(verdict.threshold, DEFAULT_COVERAGE_THRESHOLD);
        assert!(verdict.passed);
    }

    #[test]
    fn strict_mode_overrides_configured_threshold() {
        let verdict = evaluate_coverage(&sample_with(100, 80), true, Some(70.0), "gcovr");
        assert_eq!(verdict.threshold, 85.0);
        assert_eq!(verdict.configured_threshold, 70.0);
        assert!(!verdict.passed);
        assert!(verdict.message().contains("strict"));
    }

    #[test]
    fn auto_medium_threshold_tracks_current_run() {
        let verdict = evaluate_static_analysis(
            counts(0, 3, 40),
            SeverityThresholds::default(),
            5,
            "native",
            "clang-tidy",
        );
        assert_eq!(verdict.effective_thresholds.medium, 8);
        assert_eq!(verdict.effective_thresholds.high, 0);
        assert_eq!(verdict.effective_thresholds.low, None);
        assert!(verdict.passed);
    }

    #[test]
    fn negative_margin_is_clamped_to_zero() {
        let effective = EffectiveThresholds::derive(
            &SeverityThresholds::default(),
            &SeverityCounts {
                high: 0,
                medium: 4,
                low: 0,
            },
            -3,
        );
        assert_eq!(effective.medium, 4);
    }

    #[test]
    fn configured_medium_is_enforced() {
        let thresholds = SeverityThresholds {
            high: Some(0),
            medium: Some(2),
            low: None,
        };
        let verdict = evaluate_static_analysis(counts(0, 3, 0), thresholds, 5, "native", "clang-tidy");
        assert_eq!(verdict.effective_thresholds.medium, 2);
        assert!(!verdict.passed);
    }

    #[test]
    fn any_high_defect_fails_by_default() {
        let verdict = evaluate_static_analysis(
            counts(1, 0, 0),
            SeverityThresholds::default(),
            5,
            "native",
            "clang-tidy",
        );
        assert!(!verdict.passed);
    }

    #[test]
    fn low_threshold_gates_only_when_configured() {
        let thresholds = SeverityThresholds {
            high: None,
            medium: None,
            low: Some(10),
        };
        let verdict = evaluate_static_analysis(counts(0, 0, 11), thresholds, 5, "native", "clang-tidy");
        assert!(!verdict.passed);

        let verdict = evaluate_static_analysis(counts(0, 0, 10), thresholds, 5, "native", "clang-tidy");
        assert!(verdict.passed);
    }

    #[test]
    fn combined_verdict_requires_both() {
        let coverage = evaluate_coverage(&sample_with(10, 9), false, Some(80.0), "gcovr");
        let failing_sa = evaluate_static_analysis(
            counts(2, 0, 0),
            SeverityThresholds::default(),
            5,
            "native",
            "clang-tidy",
        );
        let combined = CombinedVerdict::new(coverage.clone(), failing_sa);
        assert!(!combined.passed);
        assert_eq!(combined.exit_code(), 1);

        let passing_sa = evaluate_static_analysis(
            counts(0, 0, 0),
            SeverityThresholds::default(),
            5,
            "native",
            "clang-tidy",
        );
        let combined = CombinedVerdict::new(coverage, passing_sa);
        assert!(combined.passed);
        assert_eq!(combined.exit_code(), 0);
    }
}
