//! Subprocess execution with a hard timeout.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::core::errors::{QualgateError, Result};

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from an argv vector, substituting `{env}` in every element.
    pub fn from_template(argv: &[String], environment: &str) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| QualgateError::config_field("command is empty", "measurement.test_command"))?;
        Ok(Self::new(program.replace("{env}", environment))
            .args(args.iter().map(|arg| arg.replace("{env}", environment))))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion. The child is killed if `timeout` elapses first.
    pub async fn run(&self, timeout: Duration) -> Result<CommandOutput> {
        debug!("Running `{}`", self.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            QualgateError::io(format!("Failed to start `{}`", self.display()), e)
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| QualgateError::timeout(self.display(), timeout.as_secs()))?
            .map_err(|e| QualgateError::io(format!("Failed to wait for `{}`", self.display()), e))?;

        Ok(CommandOutput::from(output))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Trimmed stdout followed by trimmed stderr
    pub fn merged_output(&self) -> String {
        let mut merged = String::new();
        if !self.stdout.trim().is_empty() {
            merged.push_str(self.stdout.trim());
        }
        if !self.stderr.trim().is_empty() {
            if !merged.is_empty() {
                merged.push('\n');
            }
            merged.push_str(self.stderr.trim());
        }
        merged
    }

    /// Stderr if present, otherwise stdout, otherwise the exit status
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        self.status.to_string()
    }
}

/// At most `max_bytes` of `text`, cut on a char boundary
pub fn excerpt(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitutes_environment() {
        let argv = vec![
            "pio".to_string(),
            "test".to_string(),
            "-e".to_string(),
            "{env}".to_string(),
        ];
        let spec = CommandSpec::from_template(&argv, "native").unwrap();
        assert_eq!(spec.program, "pio");
        assert_eq!(spec.args, vec!["test", "-e", "native"]);
        assert_eq!(spec.display(), "pio test -e native");
    }

    #[test]
    fn empty_template_is_a_config_error() {
        let err = CommandSpec::from_template(&[], "native").unwrap_err();
        assert!(matches!(err, QualgateError::Config { .. }));
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(excerpt("abcdef", 3), "abc");
        assert_eq!(excerpt("aé", 2), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn merged_output_joins_streams() {
        let output = CommandSpec::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run(Duration::from_secs(10))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.merged_output(), "out\nerr");
        assert_eq!(output.failure_detail(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_commands_time_out() {
        let err = CommandSpec::new("sleep")
            .arg("5")
            .run(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, QualgateError::Timeout { .. }));
        assert!(err.is_fatal_measurement());
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let err = CommandSpec::new("qualgate-definitely-missing-binary")
            .run(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, QualgateError::Io { .. }));
    }
}
