use handlebars::{Handlebars, Helper, HelperResult, RenderContext, RenderError};

/// Register the Handlebars helpers used by coverage reports.
pub fn register_helpers(handlebars: &mut Handlebars<'static>) {
    register_format_helper(handlebars);
    register_coverage_class_helper(handlebars);
    register_status_helper(handlebars);
}

/// `{{format value "0.2"}}`: fixed-point formatting, one decimal by default
fn register_format_helper(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper(
        "format",
        Box::new(
            |h: &Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut RenderContext,
             out: &mut dyn handlebars::Output|
             -> HelperResult {
                let value = h.param(0).and_then(|v| v.value().as_f64()).ok_or_else(|| {
                    RenderError::new("format helper requires a numeric parameter")
                })?;
                let format_str = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("0.1");
                let rendered = match format_str {
                    "0.0" => format!("{:.0}", value),
                    "0.2" => format!("{:.2}", value),
                    _ => format!("{:.1}", value),
                };
                out.write(&rendered)?;
                Ok(())
            },
        ),
    );
}

/// `{{coverage_class pct threshold}}`: CSS class for a coverage cell
fn register_coverage_class_helper(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper(
        "coverage_class",
        Box::new(
            |h: &Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut RenderContext,
             out: &mut dyn handlebars::Output|
             -> HelperResult {
                let value = h.param(0).and_then(|v| v.value().as_f64()).ok_or_else(|| {
                    RenderError::new("coverage_class helper requires a numeric parameter")
                })?;
                let threshold = h.param(1).and_then(|v| v.value().as_f64()).unwrap_or(80.0);
                out.write(coverage_class(value, threshold))?;
                Ok(())
            },
        ),
    );
}

/// `{{status passed}}`: PASS or FAIL
fn register_status_helper(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper(
        "status",
        Box::new(
            |h: &Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut RenderContext,
             out: &mut dyn handlebars::Output|
             -> HelperResult {
                let passed = h
                    .param(0)
                    .and_then(|v| v.value().as_bool())
                    .unwrap_or(false);
                out.write(if passed { "PASS" } else { "FAIL" })?;
                Ok(())
            },
        ),
    );
}

fn coverage_class(value: f64, threshold: f64) -> &'static str {
    if value >= threshold {
        "good"
    } else if value >= threshold / 2.0 {
        "warn"
    } else {
        "bad"
    }
}
