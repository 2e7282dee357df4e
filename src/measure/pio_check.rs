//! Static-analysis defect collection through `pio check --json-output`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::config::StaticAnalysisConfig;
use crate::core::errors::{QualgateError, Result};
use crate::gate::severity::ToolRun;
use crate::measure::collector::DefectCollector;
use crate::measure::command::{excerpt, CommandSpec};

/// Extra flags tried in order until one yields parseable output
const FLAG_VARIANTS: [&[&str]; 3] = [&[], &["--no-ansi"], &["--silent"]];

/// Raw output excerpt attached to parse failures
const RAW_EXCERPT_BYTES: usize = 2048;

/// Interpret one attempt's output.
///
/// Empty output from a successful run means no defects. Otherwise the output
/// must contain a JSON array of tool runs starting on its own line; progress
/// text before it and banners after it are ignored.
pub fn parse_check_output(output: &str, success: bool) -> Option<Vec<ToolRun>> {
    let output = output.trim();
    if output.is_empty() {
        return success.then(Vec::new);
    }

    array_candidates(output).find_map(|candidate| {
        serde_json::Deserializer::from_str(candidate)
            .into_iter::<Vec<ToolRun>>()
            .next()
            .and_then(|parsed| parsed.ok())
    })
}

/// Suffixes of `output` that begin with a `[` opening a line
fn array_candidates(output: &str) -> impl Iterator<Item = &str> {
    let mut offset = 0;
    output.split_inclusive('\n').filter_map(move |line| {
        let start = offset;
        offset += line.len();
        let indent = line.len() - line.trim_start().len();
        line.trim_start()
            .starts_with('[')
            .then(|| &output[start + indent..])
    })
}

/// Runs the analyzer with retrying flag variants
#[derive(Debug, Clone)]
pub struct PioCheckCollector {
    config: StaticAnalysisConfig,
}

impl PioCheckCollector {
    pub fn new(config: StaticAnalysisConfig) -> Self {
        Self { config }
    }

    fn raw_output_path(&self) -> &PathBuf {
        &self.config.raw_output_path
    }

    fn command(&self, environment: &str, extra: &[&str]) -> CommandSpec {
        let mut command = CommandSpec::new(&self.config.program)
            .args(["check", "-e", environment, "--json-output"])
            .args(extra.iter().copied());
        if !self.config.src_filter.is_empty() {
            command = command
                .arg("--src-filters")
                .arg(self.config.src_filter.join(" "));
        }
        command
    }

    fn dump_raw_output(&self, raw: &str) {
        if let Err(err) = std::fs::write(self.raw_output_path(), raw) {
            warn!(
                "Failed to write raw analyzer output to {}: {}",
                self.raw_output_path().display(),
                err
            );
        }
    }
}

#[async_trait]
impl DefectCollector for PioCheckCollector {
    fn tool(&self) -> &str {
        &self.config.tool
    }

    async fn collect(&self, environment: &str) -> Result<Vec<ToolRun>> {
        info!("Running static analysis ({}) on '{}'", self.config.tool, environment);
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let mut last_output = String::new();
        let mut last_status = String::from("not run");

        for extra in FLAG_VARIANTS {
            let command = self.command(environment, extra);
            let output = match command.run(timeout).await {
                Ok(output) => output,
                Err(err) => {
                    warn!("Analyzer attempt `{}` failed: {}", command.display(), err);
                    last_status = err.to_string();
                    continue;
                }
            };

            last_output = output.merged_output();
            last_status = output.status.to_string();
            self.dump_raw_output(&last_output);

            if let Some(runs) = parse_check_output(&last_output, output.success()) {
                let defects: usize = runs.iter().map(|r| r.defects.len()).sum();
                info!("Analyzer reported {} defects", defects);
                return Ok(runs);
            }
            debug!("Unparseable analyzer output from `{}`", command.display());
        }

        Err(QualgateError::static_analysis(
            &self.config.tool,
            format!("could not parse analyzer JSON after retries ({last_status})"),
        )
        .with_raw_excerpt(excerpt(&last_output, RAW_EXCERPT_BYTES)))
    }
}
