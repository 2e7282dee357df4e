//! The gate pipeline: measure, merge, classify, decide, then record.
//!
//! Run-scoped state (samples, verdicts) flows through return values; the
//! coordinator itself only holds configuration and collaborators.

use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::core::config::QualgateConfig;
use crate::core::errors::{QualgateError, Result};
use crate::gate::baseline::Baseline;
use crate::gate::coverage::{integrate, CoverageSample, SecondaryMeasurement};
use crate::gate::history::{HistoryEntry, HistoryLedger};
use crate::gate::retention::{CleanupSummary, ReportStats, RetentionManager, RetentionPolicy};
use crate::gate::severity::{classify_defects, ExclusionMatcher};
use crate::gate::thresholds::{
    evaluate_coverage, evaluate_static_analysis, CombinedVerdict, StaticAnalysisVerdict,
};
use crate::io::reports::{RenderedReport, ReportGenerator};
use crate::measure::{
    CoverageCollector, DefectCollector, GcovrCoverageCollector, PioCheckCollector,
};

/// How much a run measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Primary environment only
    #[default]
    Quick,
    /// Primary and secondary environments
    Full,
    /// Full measurement with the strict coverage threshold
    Release,
}

impl RunMode {
    pub fn measures_secondary(self) -> bool {
        matches!(self, Self::Full | Self::Release)
    }

    pub fn forces_strict(self) -> bool {
        matches!(self, Self::Release)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Full => "full",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = QualgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "full" => Ok(Self::Full),
            "release" => Ok(Self::Release),
            other => Err(QualgateError::validation(format!(
                "unknown run mode '{other}' (expected quick, full or release)"
            ))),
        }
    }
}

/// Everything a gate run produced
#[derive(Debug)]
pub struct GateOutcome {
    pub mode: RunMode,
    pub primary: CoverageSample,
    pub secondary: SecondaryMeasurement,
    pub integrated: CoverageSample,
    pub verdict: CombinedVerdict,
    pub reports: Vec<RenderedReport>,
    /// Entries in the history log after this run, when recording succeeded
    pub history_entries: Option<usize>,
    pub cleanup: Option<CleanupSummary>,
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }
}

/// Orchestrates one quality gate run
pub struct QualityGate {
    config: QualgateConfig,
    coverage: Box<dyn CoverageCollector>,
    defects: Box<dyn DefectCollector>,
    reports: ReportGenerator,
    history: HistoryLedger,
    retention: RetentionManager,
    cleanup_enabled: bool,
}

impl fmt::Debug for QualityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityGate")
            .field("config", &self.config)
            .field("defect_tool", &self.defects.tool())
            .field("cleanup_enabled", &self.cleanup_enabled)
            .finish_non_exhaustive()
    }
}

impl QualityGate {
    /// Gate with explicit collectors.
    pub fn new(
        config: QualgateConfig,
        coverage: Box<dyn CoverageCollector>,
        defects: Box<dyn DefectCollector>,
    ) -> Result<Self> {
        config.validate()?;

        let mut reports = ReportGenerator::new(&config.reports.output_dir)
            .with_threshold(config.coverage.threshold);
        if let Some(templates_dir) = &config.reports.templates_dir {
            reports = reports.with_templates_dir(templates_dir)?;
        }

        Ok(Self {
            history: HistoryLedger::new(&config.history.file_path, config.history.max_entries),
            retention: RetentionManager::new(&config.reports.output_dir),
            cleanup_enabled: config.cleanup.enabled,
            reports,
            coverage,
            defects,
            config,
        })
    }

    /// Gate measuring through gcovr and `pio check`.
    pub fn from_config(config: QualgateConfig) -> Result<Self> {
        let coverage = Box::new(GcovrCoverageCollector::new(config.measurement.clone()));
        let defects = Box::new(PioCheckCollector::new(config.static_analysis.clone()));
        Self::new(config, coverage, defects)
    }

    /// Override `cleanup.enabled` for this gate
    pub fn with_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup_enabled = enabled;
        self
    }

    pub fn config(&self) -> &QualgateConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// Measure the primary environment. Any failure is fatal.
    pub async fn measure_primary(&self) -> Result<CoverageSample> {
        let environment = &self.config.environments.primary;
        self.coverage
            .collect(environment)
            .await
            .map_err(|err| err.with_context(format!("primary environment '{environment}'")))
    }

    /// Measure a non-primary environment. Failure degrades to a zero sample.
    pub async fn measure_secondary(&self, environment: &str) -> SecondaryMeasurement {
        match self.coverage.collect(environment).await {
            Ok(sample) => SecondaryMeasurement::Measured(sample),
            Err(err) => {
                warn!(
                    "Coverage measurement for '{}' failed, recording 0%: {}",
                    environment, err
                );
                SecondaryMeasurement::Degraded {
                    sample: CoverageSample::zeroed(environment),
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Measure one named environment with the primary/secondary failure rules.
    pub async fn measure_environment(&self, environment: &str) -> Result<SecondaryMeasurement> {
        if environment == self.config.environments.primary {
            self.measure_primary().await.map(SecondaryMeasurement::Measured)
        } else {
            Ok(self.measure_secondary(environment).await)
        }
    }

    async fn static_analysis(&self) -> Result<StaticAnalysisVerdict> {
        let settings = &self.config.static_analysis;
        let runs = self.defects.collect(&settings.environment).await?;
        let exclusions = ExclusionMatcher::new(settings.exclude_patterns.as_slice())?;
        let severity = classify_defects(&runs, &exclusions);

        let verdict = evaluate_static_analysis(
            severity,
            settings.severity_thresholds,
            settings.auto_medium_margin,
            &settings.environment,
            self.defects.tool(),
        );

        if let Err(err) =
            ReportGenerator::write_static_analysis_report(&verdict, &settings.report_path)
        {
            warn!(
                "Failed to write static analysis report {}: {}",
                settings.report_path.display(),
                err
            );
        }
        Ok(verdict)
    }

    /// Run the gate.
    pub async fn run(&self, mode: RunMode) -> Result<GateOutcome> {
        info!("Starting {} quality gate run", mode);

        let primary = self.measure_primary().await.map_err(|err| {
            error!("Primary coverage measurement failed: {}", err);
            err
        })?;

        let secondary = match (&self.config.environments.secondary, mode.measures_secondary()) {
            (Some(environment), true) => self.measure_secondary(environment).await,
            _ => SecondaryMeasurement::Skipped,
        };

        let integrated = integrate(Some(&primary), secondary.sample())?;
        let strict_mode = mode.forces_strict() || self.config.coverage.strict_mode;
        let coverage_verdict = evaluate_coverage(
            &integrated,
            strict_mode,
            Some(self.config.coverage.threshold),
            &self.config.coverage.tool,
        );
        if coverage_verdict.passed {
            info!("{}", coverage_verdict.message());
        } else {
            warn!("{}", coverage_verdict.message());
        }

        let static_verdict = self.static_analysis().await.map_err(|err| {
            error!("Static analysis failed: {}", err);
            err
        })?;

        let verdict = CombinedVerdict::new(coverage_verdict, static_verdict);
        let reports = self.reports.render_all(&integrated);

        let history_entries = if self.config.history.enabled {
            let entry = HistoryEntry {
                timestamp: Local::now(),
                coverage_percentage: integrated.coverage_percentage,
                pure_coverage_percentage: primary.coverage_percentage,
                secondary_env_coverage_percentage: secondary.coverage_percentage(),
                gate_passed: verdict.passed,
            };
            match self.history.append(entry) {
                Ok(count) => Some(count),
                Err(err) => {
                    warn!("Failed to record gate history: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let cleanup = if self.cleanup_enabled {
            match self.clean(self.retention_policy()) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!("Report cleanup failed: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let integrated = integrated.into_owned();
        if verdict.passed {
            info!("Quality gate passed");
        } else {
            warn!("Quality gate failed");
        }

        Ok(GateOutcome {
            mode,
            primary,
            secondary,
            integrated,
            verdict,
            reports,
            history_entries,
            cleanup,
        })
    }

    /// Run a quick gate and record its coverage as the baseline.
    pub async fn run_baseline(&self) -> Result<(GateOutcome, Baseline)> {
        let outcome = self.run(RunMode::Quick).await?;
        let baseline = Baseline {
            timestamp: Local::now(),
            baseline_coverage: outcome.integrated.coverage_percentage,
            pure_coverage: outcome.primary.coverage_percentage,
        };
        baseline.write(&self.config.history.baseline_path)?;
        Ok((outcome, baseline))
    }

    /// Retention policy from configuration
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            keep_days: self.config.cleanup.keep_days,
            max_files: self.config.cleanup.max_files,
        }
    }

    pub fn clean(&self, policy: RetentionPolicy) -> Result<CleanupSummary> {
        self.retention.clean(policy)
    }

    pub fn report_stats(&self) -> Result<ReportStats> {
        self.retention.stats()
    }
}
