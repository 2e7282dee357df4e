//! CLI argument structures.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use qualgate_rs::RunMode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Coverage and static-analysis quality gate for firmware CI
#[derive(Parser)]
#[command(name = "qualgate")]
#[command(version = VERSION)]
#[command(about = "Quality gate: integrated coverage plus static-analysis severity limits")]
#[command(long_about = "
Measure coverage in the primary (and optionally secondary) test environment,
classify static-analysis defects by severity, and decide pass/fail.

Common Usage:

  # Primary environment only
  qualgate run

  # Primary and secondary environments, strict threshold
  qualgate run --mode release

  # Prune reports older than 3 days
  qualgate clean --keep-days 3

Exit status is 0 when the gate passes and 1 otherwise.
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long, global = true, env = "QUALGATE_CONFIG", default_value = "qualgate.yml")]
    pub config: PathBuf,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the quality gate
    Run(RunArgs),

    /// Measure coverage for a single environment
    Measure(MeasureArgs),

    /// Run a quick gate and record its coverage as the baseline
    Baseline,

    /// Delete old coverage reports
    Clean(CleanArgs),

    /// Show report directory statistics
    Stats(StatsArgs),

    /// Check that the toolchain and project layout are available
    #[command(name = "check-env")]
    CheckEnv,

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Initialize a configuration file with defaults
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Validate the configuration file
    #[command(name = "validate-config")]
    ValidateConfig,
}

/// Run mode as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Primary environment only
    Quick,
    /// Primary and secondary environments
    Full,
    /// Full measurement, strict threshold
    Release,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Quick => RunMode::Quick,
            ModeArg::Full => RunMode::Full,
            ModeArg::Release => RunMode::Release,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Which environments to measure
    #[arg(short, long, value_enum, default_value = "quick")]
    pub mode: ModeArg,

    /// Skip report cleanup after the run
    #[arg(long)]
    pub no_cleanup: bool,
}

#[derive(Args)]
pub struct MeasureArgs {
    /// Environment name (defaults to the configured primary)
    pub environment: Option<String>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Delete reports older than this many days (0 deletes all)
    #[arg(long)]
    pub keep_days: Option<u32>,

    /// Keep at most this many reports (0 disables the cap)
    #[arg(long)]
    pub max_files: Option<usize>,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output configuration file name
    #[arg(short, long, default_value = "qualgate.yml")]
    pub output: PathBuf,

    /// Overwrite existing configuration file
    #[arg(short, long)]
    pub force: bool,
}
