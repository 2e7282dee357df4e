//! Error types for the qualgate-rs library.
//!
//! Only measurement failures on the primary coverage path and static-analysis
//! acquisition/parse failures abort a gate run. Degraded secondary
//! measurements, renderer failures and per-file retention failures are
//! handled where they occur and only surface in logs.

use std::io;

use thiserror::Error;

use crate::io::reports::ReportError;

/// Main result type for qualgate operations.
pub type Result<T> = std::result::Result<T, QualgateError>;

/// Error type for all qualgate operations.
#[derive(Error, Debug)]
pub enum QualgateError {
    /// I/O related errors (file operations, process spawning)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Coverage could not be measured for an environment
    #[error("Coverage measurement failed for '{environment}': {message}")]
    Measurement {
        /// Environment being measured
        environment: String,
        /// Error description
        message: String,
    },

    /// The test runner failed while building or running an environment
    #[error("Build failed for '{environment}': {message}")]
    Build {
        /// Environment being built
        environment: String,
        /// Error description (usually the tool's stderr)
        message: String,
    },

    /// Static-analysis output could not be acquired or parsed
    #[error("Static analysis with {tool} failed: {message}")]
    StaticAnalysis {
        /// Analysis tool name
        tool: String,
        /// Error description
        message: String,
        /// Truncated raw tool output, if any
        raw_excerpt: Option<String>,
    },

    /// An external command exceeded its time budget
    #[error("Command `{command}` timed out after {seconds}s")]
    Timeout {
        /// Command line that was running
        command: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid glob pattern in an exclusion list
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Error description
        message: String,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Report rendering errors
    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),
}

impl QualgateError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new coverage measurement error
    pub fn measurement(environment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Measurement {
            environment: environment.into(),
            message: message.into(),
        }
    }

    /// Create a new build error
    pub fn build(environment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            environment: environment.into(),
            message: message.into(),
        }
    }

    /// Create a new static-analysis error
    pub fn static_analysis(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StaticAnalysis {
            tool: tool.into(),
            message: message.into(),
            raw_excerpt: None,
        }
    }

    /// Create a new timeout error
    pub fn timeout(command: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            command: command.into(),
            seconds,
        }
    }

    /// Create a new pattern error
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Attach a raw output excerpt to a static-analysis error
    pub fn with_raw_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        if let Self::StaticAnalysis { raw_excerpt, .. } = &mut self {
            *raw_excerpt = Some(excerpt.into());
        }
        self
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Io { message, .. }
            | Self::Measurement { message, .. }
            | Self::Build { message, .. }
            | Self::StaticAnalysis { message, .. } => {
                *message = format!("{}: {}", context.into(), message);
            }
            _ => {}
        }
        self
    }

    /// Whether this error must abort a gate run.
    pub fn is_fatal_measurement(&self) -> bool {
        matches!(
            self,
            Self::Measurement { .. }
                | Self::Build { .. }
                | Self::StaticAnalysis { .. }
                | Self::Timeout { .. }
        )
    }
}

impl From<io::Error> for QualgateError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for QualgateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for QualgateError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<globset::Error> for QualgateError {
    fn from(err: globset::Error) -> Self {
        Self::pattern(err.glob().unwrap_or("<unknown>"), err.kind().to_string())
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<QualgateError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = QualgateError::config("Invalid configuration");
        assert!(matches!(err, QualgateError::Config { .. }));

        let err = QualgateError::build("native", "pio exited with 1");
        assert!(matches!(err, QualgateError::Build { .. }));
    }

    #[test]
    fn test_config_field_error() {
        let err = QualgateError::config_field("Invalid value", "cleanup.max_files");

        if let QualgateError::Config { message, field } = err {
            assert_eq!(message, "Invalid value");
            assert_eq!(field, Some("cleanup.max_files".to_string()));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_with_context_prefixes_measurement_message() {
        let err = QualgateError::measurement("native", "no data").with_context("quick run");

        if let QualgateError::Measurement { message, .. } = err {
            assert_eq!(message, "quick run: no data");
        } else {
            panic!("Expected Measurement error");
        }
    }

    #[test]
    fn test_with_context_non_contextual_error() {
        let err = QualgateError::config("Bad config").with_context("Should not change");

        if let QualgateError::Config { message, .. } = err {
            assert_eq!(message, "Bad config");
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_raw_excerpt_only_applies_to_static_analysis() {
        let err = QualgateError::static_analysis("clang-tidy", "unparseable")
            .with_raw_excerpt("Processing...");
        if let QualgateError::StaticAnalysis { raw_excerpt, .. } = err {
            assert_eq!(raw_excerpt.as_deref(), Some("Processing..."));
        } else {
            panic!("Expected StaticAnalysis error");
        }

        let err = QualgateError::validation("x").with_raw_excerpt("ignored");
        assert!(matches!(err, QualgateError::Validation { .. }));
    }

    #[test]
    fn test_fatal_measurement_classification() {
        assert!(QualgateError::build("native", "x").is_fatal_measurement());
        assert!(QualgateError::timeout("pio test", 60).is_fatal_measurement());
        assert!(QualgateError::static_analysis("clang-tidy", "x").is_fatal_measurement());
        assert!(!QualgateError::config("x").is_fatal_measurement());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: QualgateError = json_err.into();

        if let QualgateError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("JSON".to_string()));
        } else {
            panic!("Expected Serialization error");
        }
    }

    #[test]
    fn test_from_glob_error() {
        let glob_err = globset::Glob::new("lib/[").unwrap_err();
        let err: QualgateError = glob_err.into();
        assert!(matches!(err, QualgateError::Pattern { .. }));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));

        let err = result.context("Failed to read history").unwrap_err();
        let display = err.to_string();
        assert!(display.contains("Failed to read history"));
    }

    #[test]
    fn test_timeout_display() {
        let err = QualgateError::timeout("pio check -e native", 60);
        assert_eq!(
            err.to_string(),
            "Command `pio check -e native` timed out after 60s"
        );
    }
}
