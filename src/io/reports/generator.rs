//! Renders coverage samples to HTML, Cobertura XML and JSON.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use handlebars::Handlebars;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::ReportError;
use super::helpers::register_helpers;
use super::templates::{load_templates_from_dir, register_fallback_template, COVERAGE_TEMPLATE_NAME};
use crate::gate::coverage::{percentage, CoverageSample};
use crate::gate::thresholds::{StaticAnalysisVerdict, DEFAULT_COVERAGE_THRESHOLD};

/// Rendered report kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    Html,
    Xml,
    Json,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 3] = [ReportFormat::Html, ReportFormat::Xml, ReportFormat::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

/// Outcome of one renderer
#[derive(Debug)]
pub struct RenderedReport {
    pub format: ReportFormat,
    pub result: Result<PathBuf, ReportError>,
}

#[derive(Debug)]
pub struct ReportGenerator {
    handlebars: Handlebars<'static>,
    output_dir: PathBuf,
    threshold: f64,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let mut handlebars = Handlebars::new();
        register_helpers(&mut handlebars);
        register_fallback_template(&mut handlebars);

        Self {
            handlebars,
            output_dir: output_dir.into(),
            threshold: DEFAULT_COVERAGE_THRESHOLD,
        }
    }

    /// Override built-in templates with the `.hbs` files in `templates_dir`.
    pub fn with_templates_dir<P: AsRef<Path>>(mut self, templates_dir: P) -> Result<Self, ReportError> {
        let templates_dir = templates_dir.as_ref();
        if templates_dir.exists() {
            load_templates_from_dir(&mut self.handlebars, templates_dir)?;
        }
        Ok(self)
    }

    /// Threshold used to colour HTML coverage cells
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// `coverage_report_<YYYYmmdd_HHMMSS>.<ext>` inside the output directory
    pub fn report_path(&self, format: ReportFormat, now: DateTime<Local>) -> PathBuf {
        self.output_dir.join(format!(
            "coverage_report_{}.{}",
            now.format("%Y%m%d_%H%M%S"),
            format.extension()
        ))
    }

    /// Run every renderer independently. A failing renderer is logged and
    /// does not prevent the others from running.
    pub fn render_all(&self, sample: &CoverageSample) -> Vec<RenderedReport> {
        let now = Local::now();
        ReportFormat::ALL
            .iter()
            .map(|&format| {
                let result = self.render(format, sample, now);
                match &result {
                    Ok(path) => info!("{} report written: {}", format, path.display()),
                    Err(err) => warn!("{} report generation failed: {}", format, err),
                }
                RenderedReport { format, result }
            })
            .collect()
    }

    /// Render one format into the output directory.
    pub fn render(
        &self,
        format: ReportFormat,
        sample: &CoverageSample,
        now: DateTime<Local>,
    ) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.report_path(format, now);
        let content = match format {
            ReportFormat::Html => self.html(sample, now)?,
            ReportFormat::Xml => cobertura_xml(sample, now)?,
            ReportFormat::Json => serde_json::to_string_pretty(sample)?,
        };
        fs::write(&path, content)?;
        Ok(path)
    }

    fn html(&self, sample: &CoverageSample, now: DateTime<Local>) -> Result<String, ReportError> {
        let context = self.html_context(sample, now);
        Ok(self.handlebars.render(COVERAGE_TEMPLATE_NAME, &context)?)
    }

    fn html_context(&self, sample: &CoverageSample, now: DateTime<Local>) -> Value {
        let files: Vec<Value> = sample
            .files
            .iter()
            .map(|(path, file)| {
                json!({
                    "path": path,
                    "lines_total": file.lines_total,
                    "lines_covered": file.lines_covered,
                    "line_percentage": percentage(file.lines_covered, file.lines_total),
                    "branch_percentage": percentage(file.branches_covered, file.branches_total),
                    "function_percentage": percentage(file.functions_covered, file.functions_total),
                })
            })
            .collect();

        json!({
            "environment": sample.environment,
            "generated_at": now.format("%Y-%m-%d %H:%M:%S").to_string(),
            "threshold": self.threshold,
            "coverage_percentage": sample.coverage_percentage,
            "meets_threshold": sample.coverage_percentage >= self.threshold,
            "line": sample.line,
            "branch": sample.branch,
            "function": sample.function,
            "file_count": files.len(),
            "files": files,
        })
    }

    /// Persist the static-analysis verdict as pretty JSON.
    pub fn write_static_analysis_report(
        verdict: &StaticAnalysisVerdict,
        path: impl AsRef<Path>,
    ) -> Result<(), ReportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(verdict)?)?;
        Ok(())
    }
}

fn rate(percentage: f64) -> String {
    format!("{:.4}", percentage / 100.0)
}

fn xml_error(err: impl fmt::Display) -> ReportError {
    ReportError::Xml(err.to_string())
}

/// Cobertura-style document: one class per file, no per-line detail.
fn cobertura_xml(sample: &CoverageSample, now: DateTime<Local>) -> Result<String, ReportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let line_rate = rate(sample.line.percentage);
    let branch_rate = rate(sample.branch.percentage);
    let lines_covered = sample.line.covered.to_string();
    let lines_valid = sample.line.total.to_string();
    let branches_covered = sample.branch.covered.to_string();
    let branches_valid = sample.branch.total.to_string();
    let timestamp = now.timestamp().to_string();

    let mut root = BytesStart::new("coverage");
    root.push_attribute(("line-rate", line_rate.as_str()));
    root.push_attribute(("branch-rate", branch_rate.as_str()));
    root.push_attribute(("lines-covered", lines_covered.as_str()));
    root.push_attribute(("lines-valid", lines_valid.as_str()));
    root.push_attribute(("branches-covered", branches_covered.as_str()));
    root.push_attribute(("branches-valid", branches_valid.as_str()));
    root.push_attribute(("complexity", "0"));
    root.push_attribute(("timestamp", timestamp.as_str()));
    root.push_attribute(("version", crate::VERSION));
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("packages")))
        .map_err(xml_error)?;

    let mut package = BytesStart::new("package");
    package.push_attribute(("name", sample.environment.as_str()));
    package.push_attribute(("line-rate", line_rate.as_str()));
    package.push_attribute(("branch-rate", branch_rate.as_str()));
    package.push_attribute(("complexity", "0"));
    writer.write_event(Event::Start(package)).map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("classes")))
        .map_err(xml_error)?;

    for (path, file) in &sample.files {
        let class_line_rate = rate(percentage(file.lines_covered, file.lines_total));
        let class_branch_rate = rate(percentage(file.branches_covered, file.branches_total));

        let mut class = BytesStart::new("class");
        class.push_attribute(("name", path.as_str()));
        class.push_attribute(("filename", path.as_str()));
        class.push_attribute(("line-rate", class_line_rate.as_str()));
        class.push_attribute(("branch-rate", class_branch_rate.as_str()));
        class.push_attribute(("complexity", "0"));
        writer.write_event(Event::Start(class)).map_err(xml_error)?;
        writer
            .write_event(Event::Empty(BytesStart::new("methods")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Empty(BytesStart::new("lines")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("class")))
            .map_err(xml_error)?;
    }

    for closing in ["classes", "package", "packages", "coverage"] {
        writer
            .write_event(Event::End(BytesEnd::new(closing)))
            .map_err(xml_error)?;
    }

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}
