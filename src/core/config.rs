//! Configuration types and management for qualgate-rs.
//!
//! Every section implements `Default` and is marked `#[serde(default)]`, so a
//! partial YAML (or JSON) file only needs to spell out what differs from the
//! defaults.

use std::path::{Path, PathBuf};

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::core::errors::{QualgateError, Result};

/// Coverage threshold applied when strict mode is on, regardless of the
/// configured threshold.
pub const STRICT_COVERAGE_THRESHOLD: f64 = 85.0;

/// Main configuration for a quality gate run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualgateConfig {
    /// Coverage gate settings
    pub coverage: CoverageGateConfig,

    /// Measurement environments
    pub environments: EnvironmentsConfig,

    /// External coverage measurement commands
    pub measurement: MeasurementConfig,

    /// Static-analysis gate settings
    pub static_analysis: StaticAnalysisConfig,

    /// Report output settings
    pub reports: ReportsConfig,

    /// Run history settings
    pub history: HistoryConfig,

    /// Report retention settings
    pub cleanup: CleanupConfig,

    /// Notification (logging) channels
    pub notifications: NotificationConfig,
}

impl QualgateConfig {
    /// Load configuration from a file; `.json` files are read as JSON,
    /// everything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QualgateError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        if is_json_path(path) {
            serde_json::from_str(&content).map_err(Into::into)
        } else {
            serde_yaml::from_str(&content).map_err(Into::into)
        }
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| {
            QualgateError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.coverage.validate()?;
        self.environments.validate()?;
        self.measurement.validate()?;
        self.static_analysis.validate()?;
        self.history.validate()?;
        Ok(())
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Coverage gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageGateConfig {
    /// Minimum integrated line coverage percentage
    pub threshold: f64,

    /// Enforce the strict threshold instead of `threshold`
    pub strict_mode: bool,

    /// Name of the coverage tool reported in verdicts
    pub tool: String,
}

impl Default for CoverageGateConfig {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            strict_mode: false,
            tool: "gcovr".to_string(),
        }
    }
}

impl CoverageGateConfig {
    /// Validate coverage gate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(QualgateError::config_field(
                format!(
                    "threshold must be between 0.0 and 100.0, got {}",
                    self.threshold
                ),
                "coverage.threshold",
            ));
        }
        Ok(())
    }
}

/// Measurement environment names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
    /// Mandatory environment (logic-only tests)
    pub primary: String,

    /// Optional environment (device-dependent tests), measured in full and
    /// release runs
    pub secondary: Option<String>,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            primary: "native".to_string(),
            secondary: Some("unit-test-esp32".to_string()),
        }
    }
}

impl EnvironmentsConfig {
    /// Validate environment names
    pub fn validate(&self) -> Result<()> {
        if self.primary.trim().is_empty() {
            return Err(QualgateError::config_field(
                "primary environment must not be empty",
                "environments.primary",
            ));
        }
        Ok(())
    }
}

/// Commands used to measure coverage for one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Test command; `{env}` is replaced with the environment name
    pub test_command: Vec<String>,

    /// gcovr executable
    pub gcovr_program: String,

    /// Project root handed to gcovr
    pub root: PathBuf,

    /// Paths excluded from coverage collection (gcovr `--exclude`)
    pub exclude: Vec<String>,

    /// Per-command timeout
    pub timeout_secs: u64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            test_command: vec![
                "pio".to_string(),
                "test".to_string(),
                "-e".to_string(),
                "{env}".to_string(),
            ],
            gcovr_program: "gcovr".to_string(),
            root: PathBuf::from("."),
            exclude: vec![
                "test/".to_string(),
                "lib/Arduino.*".to_string(),
                "lib/M5Stack.*".to_string(),
                "lib/WiFi.*".to_string(),
                "lib/NTPClient.*".to_string(),
                "coverage_reports/".to_string(),
                ".pio/libdeps/".to_string(),
            ],
            timeout_secs: 60,
        }
    }
}

impl MeasurementConfig {
    /// Validate measurement configuration
    pub fn validate(&self) -> Result<()> {
        if self.test_command.is_empty() {
            return Err(QualgateError::config_field(
                "test_command must name a program",
                "measurement.test_command",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(QualgateError::config_field(
                "timeout_secs must be greater than 0",
                "measurement.timeout_secs",
            ));
        }
        Ok(())
    }
}

/// Severity thresholds for the static-analysis gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    /// Maximum high-severity defects (unset means 0)
    pub high: Option<u64>,
    /// Maximum medium-severity defects (unset means auto-calibrated)
    pub medium: Option<u64>,
    /// Maximum low-severity defects (unset means never gating)
    pub low: Option<u64>,
}

/// Static-analysis gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticAnalysisConfig {
    /// Analyzer name reported in verdicts
    pub tool: String,

    /// Program that runs the analyzer (`pio check`)
    pub program: String,

    /// Environment the analyzer runs against
    pub environment: String,

    /// Defect paths matching these globs are ignored
    pub exclude_patterns: Vec<String>,

    /// Source filters passed through to the analyzer
    pub src_filter: Vec<String>,

    /// Configured severity thresholds
    pub severity_thresholds: SeverityThresholds,

    /// Slack added to the current medium count when no medium threshold is set
    pub auto_medium_margin: i64,

    /// Analyzer timeout
    pub timeout_secs: u64,

    /// Raw analyzer output of the last attempt is dumped here
    pub raw_output_path: PathBuf,

    /// Static-analysis JSON report location
    pub report_path: PathBuf,
}

impl Default for StaticAnalysisConfig {
    fn default() -> Self {
        Self {
            tool: "clang-tidy".to_string(),
            program: "pio".to_string(),
            environment: "native".to_string(),
            exclude_patterns: vec!["lib/**".to_string(), "test/**".to_string()],
            src_filter: vec![
                "+<lib/libaimatix/src/>".to_string(),
                "+<src/>".to_string(),
                "-<src/spikes/>".to_string(),
            ],
            severity_thresholds: SeverityThresholds {
                high: Some(0),
                medium: None,
                low: None,
            },
            auto_medium_margin: 5,
            timeout_secs: 60,
            raw_output_path: PathBuf::from("static_analysis_raw.txt"),
            report_path: PathBuf::from("static_analysis_report.json"),
        }
    }
}

impl StaticAnalysisConfig {
    /// Validate static-analysis configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(QualgateError::config_field(
                "timeout_secs must be greater than 0",
                "static_analysis.timeout_secs",
            ));
        }
        for pattern in &self.exclude_patterns {
            Glob::new(pattern).map_err(|e| {
                QualgateError::config_field(
                    format!("invalid exclude pattern '{pattern}': {}", e.kind()),
                    "static_analysis.exclude_patterns",
                )
            })?;
        }
        Ok(())
    }
}

/// Report output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory receiving rendered coverage reports
    pub output_dir: PathBuf,

    /// Optional directory of `.hbs` templates overriding the built-in HTML
    pub templates_dir: Option<PathBuf>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("coverage_reports"),
            templates_dir: None,
        }
    }
}

/// Run history configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record run outcomes
    pub enabled: bool,

    /// Number of most recent entries kept
    pub max_entries: usize,

    /// History log location
    pub file_path: PathBuf,

    /// Baseline snapshot location
    pub baseline_path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10,
            file_path: PathBuf::from("coverage_history.json"),
            baseline_path: PathBuf::from("coverage_baseline.json"),
        }
    }
}

impl HistoryConfig {
    /// Validate history configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(QualgateError::config_field(
                "max_entries must be greater than 0",
                "history.max_entries",
            ));
        }
        Ok(())
    }
}

/// Report retention configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Prune reports at the end of every run
    pub enabled: bool,

    /// Reports older than this many days are deleted; 0 deletes everything
    pub keep_days: u32,

    /// Maximum number of reports kept; 0 disables the count cap
    pub max_files: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_days: 7,
            max_files: 50,
        }
    }
}

/// Notification level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Progress messages
    Info,
    /// Degraded measurements and recoverable failures
    Warning,
    /// Fatal failures
    Error,
}

impl NotificationLevel {
    /// Matching tracing level
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Console notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleChannelConfig {
    /// Emit to stderr
    pub enabled: bool,
    /// Minimum level emitted
    pub level: NotificationLevel,
}

impl Default for ConsoleChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: NotificationLevel::Info,
        }
    }
}

/// File notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileChannelConfig {
    /// Append notifications to `path`
    pub enabled: bool,
    /// Notification log location
    pub path: PathBuf,
    /// Minimum level written
    pub level: NotificationLevel,
}

impl Default for FileChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("coverage_notifications.log"),
            level: NotificationLevel::Warning,
        }
    }
}

/// Notification channels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Console channel
    pub console: ConsoleChannelConfig,
    /// File channel
    pub file: FileChannelConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = QualgateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coverage.threshold, 80.0);
        assert_eq!(config.static_analysis.auto_medium_margin, 5);
        assert_eq!(config.static_analysis.severity_thresholds.high, Some(0));
        assert_eq!(config.history.max_entries, 10);
        assert_eq!(config.cleanup.keep_days, 7);
        assert_eq!(config.cleanup.max_files, 50);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
coverage:
  threshold: 72.5
static_analysis:
  severity_thresholds:
    medium: 12
"#;
        let config: QualgateConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.coverage.threshold, 72.5);
        assert!(!config.coverage.strict_mode);
        assert_eq!(config.static_analysis.severity_thresholds.medium, Some(12));
        assert_eq!(config.static_analysis.severity_thresholds.high, None);
        assert_eq!(config.environments.primary, "native");
    }

    #[test]
    fn json_config_is_detected_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coverage_config.json");
        std::fs::write(
            &path,
            r#"{"coverage": {"strict_mode": true}, "cleanup": {"keep_days": 3}}"#,
        )
        .unwrap();

        let config = QualgateConfig::from_file(&path).unwrap();
        assert!(config.coverage.strict_mode);
        assert_eq!(config.cleanup.keep_days, 3);
        assert_eq!(config.cleanup.max_files, 50);
    }

    #[test]
    fn yaml_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qualgate.yml");
        let mut config = QualgateConfig::default();
        config.environments.secondary = None;
        config.to_yaml_file(&path).unwrap();

        let loaded = QualgateConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = QualgateConfig::default();
        config.coverage.threshold = 120.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, QualgateError::Config { .. }));
    }

    #[test]
    fn rejects_zero_history_entries() {
        let mut config = QualgateConfig::default();
        config.history.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_exclude_pattern() {
        let mut config = QualgateConfig::default();
        config.static_analysis.exclude_patterns = vec!["src/[".to_string()];
        let err = config.validate().unwrap_err();
        if let QualgateError::Config { field, .. } = err {
            assert_eq!(field.as_deref(), Some("static_analysis.exclude_patterns"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn notification_levels_are_ordered() {
        assert!(NotificationLevel::Info < NotificationLevel::Warning);
        assert!(NotificationLevel::Warning < NotificationLevel::Error);
        let level: NotificationLevel = serde_yaml::from_str("warning").unwrap();
        assert_eq!(level, NotificationLevel::Warning);
    }
}
