//! Console rendering of gate results.

use owo_colors::OwoColorize;

use qualgate_rs::gate::retention::{CleanupSummary, ReportStats};
use qualgate_rs::gate::thresholds::{CoverageVerdict, StaticAnalysisVerdict};
use qualgate_rs::measure::probe::EnvironmentReport;
use qualgate_rs::{CoverageSample, GateOutcome, SecondaryMeasurement};

fn status(passed: bool) -> String {
    if passed {
        "PASS".bright_green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    }
}

fn limit(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn coverage_line(verdict: &CoverageVerdict) -> String {
    format!(
        "Coverage: {} | {:.1}% (threshold {}%, {} mode)",
        status(verdict.passed),
        verdict.actual_coverage,
        verdict.threshold,
        if verdict.strict_mode { "strict" } else { "normal" }
    )
}

pub fn static_analysis_line(verdict: &StaticAnalysisVerdict) -> String {
    let effective = &verdict.effective_thresholds;
    format!(
        "Static Analysis: {} | high={}/{}, medium={}/{}, low={}/{}",
        status(verdict.passed),
        verdict.totals.high,
        effective.high,
        verdict.totals.medium,
        effective.medium,
        verdict.totals.low,
        limit(effective.low)
    )
}

pub fn display_outcome(outcome: &GateOutcome) {
    println!();
    println!(
        "{} {}",
        "Quality gate".bright_blue().bold(),
        format!("({} mode)", outcome.mode).dimmed()
    );
    display_sample("primary", &outcome.primary);
    match &outcome.secondary {
        SecondaryMeasurement::Skipped => {}
        SecondaryMeasurement::Measured(sample) => display_sample("secondary", sample),
        SecondaryMeasurement::Degraded { sample, reason } => {
            display_sample("secondary", sample);
            println!("  {} {}", "degraded:".yellow(), reason);
        }
    }
    display_sample("integrated", &outcome.integrated);

    for report in &outcome.reports {
        match &report.result {
            Ok(path) => println!("  {} report: {}", report.format, path.display().cyan()),
            Err(err) => println!("  {} report: {}", report.format, err.to_string().yellow()),
        }
    }
    if let Some(summary) = &outcome.cleanup {
        display_cleanup(summary);
    }

    println!();
    println!("{}", coverage_line(&outcome.verdict.coverage));
    println!("{}", static_analysis_line(&outcome.verdict.static_analysis));
    println!("Overall: {}", status(outcome.passed()));
}

pub fn display_sample(label: &str, sample: &CoverageSample) {
    println!(
        "  {:<11} {:<18} {:>6.1}%  lines {}/{}  branches {}/{}  functions {}/{}",
        format!("{label}:"),
        sample.environment,
        sample.coverage_percentage,
        sample.line.covered,
        sample.line.total,
        sample.branch.covered,
        sample.branch.total,
        sample.function.covered,
        sample.function.total
    );
}

pub fn display_cleanup(summary: &CleanupSummary) {
    println!(
        "  cleanup: {} deleted ({:.1} KB), {} remaining{}",
        summary.deleted_files,
        summary.deleted_bytes as f64 / 1024.0,
        summary.remaining_files,
        if summary.failed_deletions > 0 {
            format!(", {} failed", summary.failed_deletions)
        } else {
            String::new()
        }
    );
}

pub fn display_stats(stats: &ReportStats) {
    println!("{}", "Report statistics".bright_blue().bold());
    println!("  total files:   {}", stats.total_files);
    println!("  total size:    {:.1} KB", stats.total_size_bytes as f64 / 1024.0);
    println!("  HTML files:    {}", stats.html_files);
    println!("  XML files:     {}", stats.xml_files);
    println!("  JSON files:    {}", stats.json_files);
    println!("  oldest:        {} days", stats.oldest_file_days);
    println!("  newest:        {} days", stats.newest_file_days);
}

pub fn display_environment(report: &EnvironmentReport) {
    println!("{}", "Environment check".bright_blue().bold());
    for probe in &report.probes {
        let mark = if probe.ok {
            "OK".bright_green().to_string()
        } else {
            "NG".red().to_string()
        };
        println!("  {:<17} {}  {}", probe.name, mark, probe.detail.dimmed());
    }
}
