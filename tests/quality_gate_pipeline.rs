//! End-to-end gate runs with in-memory collectors.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tempfile::tempdir;

use qualgate_rs::core::config::SeverityThresholds;
use qualgate_rs::gate::coverage::FileCoverage;
use qualgate_rs::gate::severity::{RawDefect, ToolRun};
use qualgate_rs::measure::{CoverageCollector, DefectCollector};
use qualgate_rs::{
    CoverageSample, QualgateConfig, QualgateError, QualityGate, Result, RunMode,
    SecondaryMeasurement,
};

/// Returns canned samples; environments without one fail to measure.
struct FakeCoverage {
    samples: HashMap<String, CoverageSample>,
    calls: Arc<AtomicUsize>,
}

impl FakeCoverage {
    fn new(samples: Vec<CoverageSample>) -> Self {
        Self {
            samples: samples
                .into_iter()
                .map(|s| (s.environment.clone(), s))
                .collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl CoverageCollector for FakeCoverage {
    async fn collect(&self, environment: &str) -> Result<CoverageSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.samples
            .get(environment)
            .cloned()
            .ok_or_else(|| QualgateError::build(environment, "upload port not found"))
    }
}

struct FakeDefects {
    runs: Option<Vec<ToolRun>>,
}

#[async_trait]
impl DefectCollector for FakeDefects {
    fn tool(&self) -> &str {
        "clang-tidy"
    }

    async fn collect(&self, _environment: &str) -> Result<Vec<ToolRun>> {
        self.runs.clone().ok_or_else(|| {
            QualgateError::static_analysis("clang-tidy", "unparseable output")
                .with_raw_excerpt("Checking native > clangtidy")
        })
    }
}

fn file(lines_total: u64, lines_covered: u64) -> FileCoverage {
    FileCoverage {
        lines_total,
        lines_covered,
        ..FileCoverage::default()
    }
}

fn sample(environment: &str, files: &[(&str, FileCoverage)]) -> CoverageSample {
    let files: IndexMap<String, FileCoverage> = files
        .iter()
        .map(|(path, record)| (path.to_string(), *record))
        .collect();
    CoverageSample::from_files(environment, files)
}

fn defects(entries: &[(&str, &str)]) -> Vec<ToolRun> {
    vec![ToolRun {
        env: Some("native".to_string()),
        tool: Some("clangtidy".to_string()),
        defects: entries
            .iter()
            .map(|(severity, file)| RawDefect {
                severity: Some(severity.to_string()),
                file: Some(file.to_string()),
            })
            .collect(),
    }]
}

fn config_in(dir: &Path) -> QualgateConfig {
    let mut config = QualgateConfig::default();
    config.reports.output_dir = dir.join("coverage_reports");
    config.history.file_path = dir.join("coverage_history.json");
    config.history.baseline_path = dir.join("coverage_baseline.json");
    config.static_analysis.report_path = dir.join("static_analysis_report.json");
    config.static_analysis.raw_output_path = dir.join("static_analysis_raw.txt");
    config.notifications.file.enabled = false;
    config
}

fn gate(
    config: QualgateConfig,
    coverage: FakeCoverage,
    runs: Option<Vec<ToolRun>>,
) -> QualityGate {
    QualityGate::new(config, Box::new(coverage), Box::new(FakeDefects { runs })).unwrap()
}

#[tokio::test]
async fn quick_run_measures_primary_only() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![sample("native", &[("src/alarm.cpp", file(10, 9))])]);
    let calls = Arc::clone(&coverage.calls);

    let outcome = gate(config_in(dir.path()), coverage, Some(Vec::new()))
        .run(RunMode::Quick)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(outcome.secondary, SecondaryMeasurement::Skipped));
    assert_eq!(outcome.integrated, outcome.primary);
    assert!(outcome.passed());
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.verdict.static_analysis.totals.total(), 0);
}

#[tokio::test]
async fn full_run_merges_secondary_over_primary() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![
        sample("native", &[("A", file(10, 10)), ("B", file(10, 2))]),
        sample("unit-test-esp32", &[("B", file(20, 18)), ("C", file(5, 0))]),
    ]);

    let outcome = gate(config_in(dir.path()), coverage, Some(Vec::new()))
        .run(RunMode::Full)
        .await
        .unwrap();

    assert_eq!(outcome.integrated.environment, "integrated");
    assert_eq!(outcome.integrated.files.len(), 3);
    assert_eq!(outcome.integrated.files["B"], file(20, 18));
    assert_eq!(outcome.integrated.line.total, 35);
    assert!(outcome.passed());
}

#[tokio::test]
async fn degraded_secondary_does_not_abort() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![sample("native", &[("A", file(4, 3))])]);

    let outcome = gate(config_in(dir.path()), coverage, Some(Vec::new()))
        .run(RunMode::Full)
        .await
        .unwrap();

    assert!(outcome.secondary.is_degraded());
    assert_eq!(outcome.secondary.coverage_percentage(), 0.0);
    assert_eq!(outcome.integrated.coverage_percentage, 75.0);
    assert!(!outcome.verdict.coverage.passed);

    let history: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("coverage_history.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(history[0]["secondary_env_coverage_percentage"], 0.0);
    assert_eq!(history[0]["pure_coverage_percentage"], 75.0);
}

#[tokio::test]
async fn primary_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![sample("unit-test-esp32", &[("A", file(1, 1))])]);

    let err = gate(config_in(dir.path()), coverage, Some(Vec::new()))
        .run(RunMode::Full)
        .await
        .unwrap_err();

    assert!(matches!(err, QualgateError::Build { .. }));
    assert!(err.is_fatal_measurement());
    assert!(!dir.path().join("coverage_history.json").exists());
}

#[tokio::test]
async fn unparseable_static_analysis_is_fatal() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![sample("native", &[("A", file(1, 1))])]);

    let err = gate(config_in(dir.path()), coverage, None)
        .run(RunMode::Quick)
        .await
        .unwrap_err();

    if let QualgateError::StaticAnalysis { raw_excerpt, .. } = err {
        assert_eq!(raw_excerpt.as_deref(), Some("Checking native > clangtidy"));
    } else {
        panic!("Expected StaticAnalysis error");
    }
}

#[tokio::test]
async fn high_defect_fails_gate_and_history_still_records() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![sample("native", &[("A", file(10, 10))])]);
    let runs = defects(&[
        ("high", "src/alarm.cpp"),
        ("medium", "src/ui.cpp"),
        ("high", "lib/vendor/driver.cpp"),
    ]);

    let outcome = gate(config_in(dir.path()), coverage, Some(runs))
        .run(RunMode::Quick)
        .await
        .unwrap();

    assert!(outcome.verdict.coverage.passed);
    assert!(!outcome.verdict.static_analysis.passed);
    assert_eq!(outcome.verdict.static_analysis.totals.high, 1);
    assert_eq!(outcome.verdict.static_analysis.effective_thresholds.medium, 6);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.history_entries, Some(1));

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("static_analysis_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["passed"], false);
    assert_eq!(report["totals"]["high"], 1);
    assert_eq!(report["by_file"]["src/alarm.cpp"]["high"], 1);
    assert!(report["thresholds"]["medium"].is_null());
}

#[tokio::test]
async fn release_mode_uses_strict_threshold() {
    let dir = tempdir().unwrap();
    let coverage = FakeCoverage::new(vec![
        sample("native", &[("A", file(100, 82))]),
        sample("unit-test-esp32", &[]),
    ]);

    let outcome = gate(config_in(dir.path()), coverage, Some(Vec::new()))
        .run(RunMode::Release)
        .await
        .unwrap();

    assert!(outcome.verdict.coverage.strict_mode);
    assert_eq!(outcome.verdict.coverage.threshold, 85.0);
    assert!(!outcome.passed());
}

#[tokio::test]
async fn run_renders_reports_and_cleans_up() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.static_analysis.severity_thresholds = SeverityThresholds {
        high: Some(0),
        medium: Some(10),
        low: None,
    };
    let reports_dir = config.reports.output_dir.clone();
    fs::create_dir_all(&reports_dir).unwrap();
    for i in 0..5 {
        fs::write(reports_dir.join(format!("old_{i}.json")), "{}").unwrap();
    }
    config.cleanup.max_files = 3;

    let coverage = FakeCoverage::new(vec![sample("native", &[("A", file(10, 9))])]);
    let outcome = gate(config, coverage, Some(Vec::new()))
        .run(RunMode::Quick)
        .await
        .unwrap();

    assert_eq!(outcome.reports.len(), 3);
    assert!(outcome.reports.iter().all(|r| r.result.is_ok()));

    let cleanup = outcome.cleanup.unwrap();
    assert_eq!(cleanup.remaining_files, 3);
    assert_eq!(cleanup.deleted_files, 5);
    assert_eq!(fs::read_dir(&reports_dir).unwrap().count(), 3);
}

#[tokio::test]
async fn cleanup_can_be_disabled_per_run() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.cleanup.keep_days = 0;

    let coverage = FakeCoverage::new(vec![sample("native", &[("A", file(10, 9))])]);
    let outcome = gate(config.clone(), coverage, Some(Vec::new()))
        .with_cleanup(false)
        .run(RunMode::Quick)
        .await
        .unwrap();

    assert!(outcome.cleanup.is_none());
    assert_eq!(fs::read_dir(&config.reports.output_dir).unwrap().count(), 3);
}

#[tokio::test]
async fn history_is_bounded_across_runs() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.history.max_entries = 2;
    config.cleanup.enabled = false;

    let gate = gate(
        config,
        FakeCoverage::new(vec![sample("native", &[("A", file(10, 9))])]),
        Some(Vec::new()),
    );
    for _ in 0..3 {
        gate.run(RunMode::Quick).await.unwrap();
    }

    assert_eq!(gate.history().load().len(), 2);
}

#[tokio::test]
async fn baseline_records_quick_run_coverage() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let baseline_path = config.history.baseline_path.clone();

    let (_, baseline) = gate(
        config,
        FakeCoverage::new(vec![sample("native", &[("A", file(8, 6))])]),
        Some(Vec::new()),
    )
    .run_baseline()
    .await
    .unwrap();

    assert_eq!(baseline.baseline_coverage, 75.0);
    assert_eq!(baseline.pure_coverage, 75.0);
    assert!(baseline_path.exists());
}

#[tokio::test]
async fn measure_environment_applies_failure_rules() {
    let dir = tempdir().unwrap();
    let gate = gate(
        config_in(dir.path()),
        FakeCoverage::new(vec![sample("native", &[("A", file(2, 1))])]),
        Some(Vec::new()),
    );

    let primary = gate.measure_environment("native").await.unwrap();
    assert!(matches!(primary, SecondaryMeasurement::Measured(_)));

    let secondary = gate.measure_environment("unit-test-esp32").await.unwrap();
    assert!(secondary.is_degraded());

    let strict = QualityGate::new(
        {
            let mut config = config_in(dir.path());
            config.environments.primary = "missing".to_string();
            config
        },
        Box::new(FakeCoverage::new(Vec::new())),
        Box::new(FakeDefects { runs: None }),
    )
    .unwrap();
    assert!(strict.measure_environment("missing").await.is_err());
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.coverage.threshold = 150.0;

    let result = QualityGate::new(
        config,
        Box::new(FakeCoverage::new(Vec::new())),
        Box::new(FakeDefects { runs: None }),
    );
    assert!(matches!(result, Err(QualgateError::Config { .. })));
}
