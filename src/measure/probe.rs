//! Toolchain and project layout checks for `check-env`.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::config::QualgateConfig;
use crate::measure::command::CommandSpec;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Test directories expected under the project root
const TEST_DIRECTORIES: [&str; 2] = ["test/pure", "test/integration"];

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

/// All checks; none of them aborts the others
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentReport {
    pub probes: Vec<ProbeResult>,
}

impl EnvironmentReport {
    pub fn all_ok(&self) -> bool {
        self.probes.iter().all(|p| p.ok)
    }

    fn push(&mut self, name: &str, ok: bool, detail: impl Into<String>) {
        let detail = detail.into();
        if ok {
            info!("{}: OK ({})", name, detail);
        } else {
            warn!("{}: NG ({})", name, detail);
        }
        self.probes.push(ProbeResult {
            name: name.to_string(),
            ok,
            detail,
        });
    }
}

async fn probe_version(program: &str) -> (bool, String) {
    match CommandSpec::new(program)
        .arg("--version")
        .run(PROBE_TIMEOUT)
        .await
    {
        Ok(output) if output.success() => {
            let first_line = output.stdout.lines().next().unwrap_or_default().trim().to_string();
            (true, first_line)
        }
        Ok(output) => (false, output.failure_detail()),
        Err(err) => (false, err.to_string()),
    }
}

/// Probe the test runner, gcovr, the configuration file and the test
/// directories.
pub async fn check_environment(config: &QualgateConfig, config_path: &Path) -> EnvironmentReport {
    let mut report = EnvironmentReport::default();

    let runner = config
        .measurement
        .test_command
        .first()
        .map(String::as_str)
        .unwrap_or("pio");
    let (ok, detail) = probe_version(runner).await;
    report.push("test runner", ok, detail);

    let (ok, detail) = probe_version(&config.measurement.gcovr_program).await;
    report.push("gcovr", ok, detail);

    let config_exists = config_path.is_file();
    report.push(
        "config file",
        config_exists,
        config_path.display().to_string(),
    );

    let root = &config.measurement.root;
    let missing: Vec<_> = TEST_DIRECTORIES
        .iter()
        .filter(|dir| !root.join(dir).is_dir())
        .copied()
        .collect();
    if missing.is_empty() {
        report.push("test directories", true, TEST_DIRECTORIES.join(", "));
    } else {
        report.push("test directories", false, format!("missing {}", missing.join(", ")));
    }

    if report.all_ok() {
        info!("Environment check: all OK");
    } else {
        error!("Environment check: some probes failed");
    }
    report
}
