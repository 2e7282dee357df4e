//! Coverage collection through the PlatformIO test runner and gcovr.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::config::MeasurementConfig;
use crate::core::errors::{QualgateError, Result};
use crate::gate::coverage::{CoverageSample, FileCoverage, Metric};
use crate::gate::severity::normalize_path;
use crate::measure::collector::CoverageCollector;
use crate::measure::command::CommandSpec;

const GCOV_IGNORE_ERRORS: [&str; 2] = [
    "--gcov-ignore-errors=no_working_dir_found",
    "--gcov-ignore-errors=source_not_found",
];

/// Per-file record of `gcovr --json-summary`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcovrFileSummary {
    #[serde(alias = "file")]
    pub filename: String,
    #[serde(default)]
    pub line_total: u64,
    #[serde(default)]
    pub line_covered: u64,
    #[serde(default)]
    pub branch_total: u64,
    #[serde(default)]
    pub branch_covered: u64,
    #[serde(default)]
    pub function_total: u64,
    #[serde(default)]
    pub function_covered: u64,
}

/// Top level of `gcovr --json-summary`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcovrSummary {
    #[serde(default)]
    pub files: Vec<GcovrFileSummary>,
}

impl GcovrSummary {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Convert to a sample, rejecting a summary without any file records so
    /// the caller can fall back to the text summary.
    pub fn into_measured_sample(self, environment: &str) -> Result<CoverageSample> {
        if self.files.is_empty() {
            return Err(QualgateError::measurement(
                environment,
                "gcovr JSON summary lists no files",
            ));
        }
        Ok(self.into_sample(environment))
    }

    /// Convert to a sample. Duplicate paths keep the last record.
    pub fn into_sample(self, environment: &str) -> CoverageSample {
        let files: IndexMap<String, FileCoverage> = self
            .files
            .into_iter()
            .map(|file| {
                (
                    normalize_path(&file.filename),
                    FileCoverage {
                        lines_total: file.line_total,
                        lines_covered: file.line_covered,
                        branches_total: file.branch_total,
                        branches_covered: file.branch_covered,
                        functions_total: file.function_total,
                        functions_covered: file.function_covered,
                    },
                )
            })
            .collect();
        CoverageSample::from_files(environment, files)
    }
}

/// Read the `lines:`, `branches:` and `functions:` rows of
/// `gcovr --print-summary`. The file map of the result is empty.
pub fn parse_print_summary(text: &str, environment: &str) -> Option<CoverageSample> {
    let mut line = None;
    let mut branch = Metric::default();
    let mut function = Metric::default();

    for row in text.lines() {
        let row = row.trim();
        let Some((label, rest)) = row.split_once(':') else {
            continue;
        };
        let Some(metric) = parse_summary_counts(rest) else {
            continue;
        };
        match label.trim() {
            "lines" => line = Some(metric),
            "branches" => branch = metric,
            "functions" => function = metric,
            _ => {}
        }
    }

    let line = line?;
    Some(CoverageSample {
        environment: environment.to_string(),
        coverage_percentage: line.percentage,
        line,
        branch,
        function,
        files: IndexMap::new(),
    })
}

/// `80.0% (40 out of 50)` into a metric recomputed from the counts
fn parse_summary_counts(rest: &str) -> Option<Metric> {
    let inner = rest.split_once('(')?.1.split_once(')')?.0;
    let (covered, total) = inner.split_once("out of")?;
    let covered = covered.trim().parse().ok()?;
    let total = total.trim().parse().ok()?;
    Some(Metric::new(total, covered))
}

/// Runs the test command for an environment, then summarises with gcovr
#[derive(Debug, Clone)]
pub struct GcovrCoverageCollector {
    config: MeasurementConfig,
}

impl GcovrCoverageCollector {
    pub fn new(config: MeasurementConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn gcovr_command(&self) -> CommandSpec {
        let mut command = CommandSpec::new(&self.config.gcovr_program)
            .arg("--root")
            .arg(self.config.root.to_string_lossy());
        for exclude in &self.config.exclude {
            command = command.arg("--exclude").arg(exclude);
        }
        command.args(GCOV_IGNORE_ERRORS)
    }

    async fn run_tests(&self, environment: &str) -> Result<()> {
        let command = CommandSpec::from_template(&self.config.test_command, environment)?;
        let output = command.run(self.timeout()).await.map_err(|err| match err {
            QualgateError::Timeout { .. } => err,
            other => QualgateError::build(environment, other.to_string()),
        })?;

        if !output.success() {
            return Err(QualgateError::build(environment, output.failure_detail()));
        }
        Ok(())
    }

    async fn json_summary(&self, environment: &str) -> Result<CoverageSample> {
        let output = self
            .gcovr_command()
            .arg("--json-summary")
            .run(self.timeout())
            .await?;
        if !output.success() {
            return Err(QualgateError::measurement(
                environment,
                format!("gcovr --json-summary failed: {}", output.failure_detail()),
            ));
        }
        GcovrSummary::parse(&output.stdout)?.into_measured_sample(environment)
    }

    async fn print_summary(&self, environment: &str) -> Result<CoverageSample> {
        let output = self
            .gcovr_command()
            .arg("--print-summary")
            .run(self.timeout())
            .await?;
        parse_print_summary(&output.merged_output(), environment).ok_or_else(|| {
            QualgateError::measurement(environment, "gcovr summary contained no line totals")
        })
    }
}

#[async_trait]
impl CoverageCollector for GcovrCoverageCollector {
    async fn collect(&self, environment: &str) -> Result<CoverageSample> {
        info!("Measuring coverage for '{}'", environment);
        self.run_tests(environment).await?;

        let sample = match self.json_summary(environment).await {
            Ok(sample) => sample,
            Err(err) => {
                warn!("gcovr JSON summary unavailable ({}); trying text summary", err);
                match self.print_summary(environment).await {
                    Ok(sample) => sample,
                    Err(err) => {
                        warn!("gcovr text summary unavailable ({}); recording 0%", err);
                        CoverageSample::zeroed(environment)
                    }
                }
            }
        };

        info!(
            "Coverage for '{}': {:.1}%",
            environment, sample.coverage_percentage
        );
        Ok(sample)
    }
}
