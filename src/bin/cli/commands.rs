//! Command execution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use owo_colors::OwoColorize;
use tracing::{info, warn};

use qualgate_rs::gate::baseline::Baseline;
use qualgate_rs::gate::retention::RetentionPolicy;
use qualgate_rs::measure::probe::check_environment;
use qualgate_rs::{QualgateConfig, QualgateError, QualityGate, SecondaryMeasurement};

use crate::cli::args::{CleanArgs, InitConfigArgs, MeasureArgs, RunArgs, StatsArgs};
use crate::cli::logging;
use crate::cli::output::{
    display_cleanup, display_environment, display_outcome, display_sample, display_stats,
};

/// Configuration plus whether it came from a file
pub struct LoadedConfig {
    pub config: QualgateConfig,
    pub path: PathBuf,
    pub from_file: bool,
}

/// Load and validate configuration. A missing file falls back to defaults;
/// a malformed one is an error.
pub fn load_configuration(path: &Path) -> anyhow::Result<LoadedConfig> {
    if !path.exists() {
        return Ok(LoadedConfig {
            config: QualgateConfig::default(),
            path: path.to_path_buf(),
            from_file: false,
        });
    }

    let config = QualgateConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        from_file: true,
    })
}

/// Load configuration, install logging, then report where the
/// configuration came from.
pub fn setup(path: &Path, verbose: bool) -> anyhow::Result<LoadedConfig> {
    let loaded = load_configuration(path)?;
    logging::init(&loaded.config.notifications, verbose);

    if loaded.from_file {
        info!("Using configuration {}", loaded.path.display());
    } else {
        warn!(
            "Configuration file {} not found; using defaults",
            loaded.path.display()
        );
    }
    Ok(loaded)
}

pub async fn run_command(args: RunArgs, config: QualgateConfig) -> anyhow::Result<i32> {
    let mut gate = QualityGate::from_config(config)?;
    if args.no_cleanup {
        gate = gate.with_cleanup(false);
    }

    match gate.run(args.mode.into()).await {
        Ok(outcome) => {
            display_outcome(&outcome);
            Ok(outcome.exit_code())
        }
        Err(err) => aborted(err),
    }
}

/// A failed measurement is a failed gate (exit 1); anything else is an
/// operational error.
fn aborted(err: QualgateError) -> anyhow::Result<i32> {
    if !err.is_fatal_measurement() {
        return Err(err.into());
    }
    eprintln!("{} {}", "Quality gate aborted:".red().bold(), err);
    println!("Overall: {}", "FAIL".red().bold());
    Ok(1)
}

pub async fn measure_command(args: MeasureArgs, config: QualgateConfig) -> anyhow::Result<i32> {
    let environment = args
        .environment
        .unwrap_or_else(|| config.environments.primary.clone());
    let gate = QualityGate::from_config(config)?;

    let measurement = match gate.measure_environment(&environment).await {
        Ok(measurement) => measurement,
        Err(err) => return aborted(err),
    };
    match measurement {
        SecondaryMeasurement::Measured(sample) => display_sample("measured", &sample),
        SecondaryMeasurement::Degraded { sample, reason } => {
            display_sample("degraded", &sample);
            println!("  {} {}", "reason:".yellow(), reason);
        }
        SecondaryMeasurement::Skipped => {}
    }
    Ok(0)
}

pub async fn baseline_command(config: QualgateConfig) -> anyhow::Result<i32> {
    let baseline_path = config.history.baseline_path.clone();
    let gate = QualityGate::from_config(config)?;
    let previous = Baseline::load(&baseline_path).ok();

    let (outcome, baseline) = match gate.run_baseline().await {
        Ok(recorded) => recorded,
        Err(err) => return aborted(err),
    };
    display_outcome(&outcome);
    println!();
    println!(
        "{} {:.1}% -> {}",
        "Baseline recorded:".bright_green().bold(),
        baseline.baseline_coverage,
        baseline_path.display().cyan()
    );
    if let Some(previous) = previous {
        println!(
            "  previous baseline {:.1}% ({}), change {:+.1}%",
            previous.baseline_coverage,
            previous.timestamp.format("%Y-%m-%d %H:%M"),
            baseline.baseline_coverage - previous.baseline_coverage
        );
    }
    Ok(0)
}

pub fn clean_command(args: CleanArgs, config: QualgateConfig) -> anyhow::Result<i32> {
    let policy = RetentionPolicy {
        keep_days: args.keep_days.unwrap_or(config.cleanup.keep_days),
        max_files: args.max_files.unwrap_or(config.cleanup.max_files),
    };
    let gate = QualityGate::from_config(config)?;

    let summary = gate.clean(policy)?;
    display_cleanup(&summary);
    Ok(0)
}

pub fn stats_command(args: StatsArgs, config: QualgateConfig) -> anyhow::Result<i32> {
    let gate = QualityGate::from_config(config)?;
    let stats = gate.report_stats()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        display_stats(&stats);
    }
    Ok(0)
}

pub async fn check_env_command(loaded: &LoadedConfig) -> anyhow::Result<i32> {
    let report = check_environment(&loaded.config, &loaded.path).await;
    display_environment(&report);
    Ok(if report.all_ok() { 0 } else { 1 })
}

pub fn print_default_config() -> anyhow::Result<i32> {
    println!("{}", "# Default qualgate configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!("{}", "# Usage: qualgate --config your-config.yml run".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&QualgateConfig::default())?;
    println!("{}", yaml_output);
    Ok(0)
}

pub fn init_config(args: InitConfigArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!(
            "{} {}",
            "Configuration file already exists:".red(),
            args.output.display()
        );
        eprintln!("   Use --force to overwrite or choose a different name with --output");
        return Ok(1);
    }

    QualgateConfig::default().to_yaml_file(&args.output)?;

    println!(
        "{} {}",
        "Configuration saved to:".bright_green().bold(),
        args.output.display().to_string().cyan()
    );
    println!(
        "   Run the gate with: {}",
        format!("qualgate --config {} run", args.output.display()).cyan()
    );
    Ok(0)
}

pub fn validate_config(path: &Path) -> anyhow::Result<i32> {
    println!(
        "{} {}",
        "Validating configuration:".bright_blue().bold(),
        path.display().to_string().cyan()
    );

    if !path.exists() {
        eprintln!("{} file not found", "Configuration validation failed:".red());
        return Ok(1);
    }

    match QualgateConfig::from_file(path).and_then(|config| config.validate().map(|()| config)) {
        Ok(config) => {
            println!("{}", "Configuration file is valid!".bright_green().bold());
            println!("  coverage threshold: {}%", config.coverage.threshold);
            println!("  strict mode:        {}", config.coverage.strict_mode);
            println!(
                "  environments:       {} / {}",
                config.environments.primary,
                config.environments.secondary.as_deref().unwrap_or("-")
            );
            println!("  history entries:    {}", config.history.max_entries);
            println!(
                "  cleanup:            keep {} days, max {} files",
                config.cleanup.keep_days, config.cleanup.max_files
            );
            Ok(0)
        }
        Err(err) => {
            eprintln!("{} {}", "Configuration validation failed:".red(), err);
            eprintln!(
                "{}",
                "Tip: use 'qualgate print-default-config' to see the valid format".dimmed()
            );
            Ok(1)
        }
    }
}
