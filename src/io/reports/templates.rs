use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use tracing::warn;

use super::error::ReportError;

pub(super) const COVERAGE_TEMPLATE_NAME: &str = "coverage_report";

pub(super) fn register_fallback_template(handlebars: &mut Handlebars<'static>) {
    if let Err(err) = handlebars.register_template_string(
        COVERAGE_TEMPLATE_NAME,
        include_str!("./default_report.hbs"),
    ) {
        warn!("Failed to register fallback HTML template: {}", err);
    }
}

/// Register every `.hbs` file in `templates_dir` under its file stem, plus
/// partials from `templates_dir/partials`.
pub(super) fn load_templates_from_dir(
    handlebars: &mut Handlebars<'static>,
    templates_dir: &Path,
) -> Result<(), ReportError> {
    for (name, content) in read_hbs_files(templates_dir, "Invalid template filename")? {
        handlebars.register_template_string(&name, content)?;
    }

    let partials_dir = templates_dir.join("partials");
    if partials_dir.is_dir() {
        for (name, content) in read_hbs_files(&partials_dir, "Invalid partial filename")? {
            handlebars.register_partial(&name, content)?;
        }
    }

    Ok(())
}

fn read_hbs_files(dir: &Path, invalid_name: &str) -> Result<Vec<(String, String)>, ReportError> {
    let mut templates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("hbs") {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, invalid_name))?
            .to_string();
        templates.push((name, fs::read_to_string(&path)?));
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn fallback_template_is_registered() {
        let mut handlebars = Handlebars::new();
        register_fallback_template(&mut handlebars);
        assert!(handlebars.get_templates().contains_key(COVERAGE_TEMPLATE_NAME));
    }

    #[test]
    fn external_templates_override_by_stem() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("partials")).unwrap();
        std::fs::write(
            temp.path().join("coverage_report.hbs"),
            "{{#each files}}{{> row}}{{/each}}",
        )
        .unwrap();
        std::fs::write(temp.path().join("partials").join("row.hbs"), "<li>{{this}}</li>").unwrap();
        std::fs::write(temp.path().join("README.md"), "ignored").unwrap();

        let mut handlebars = Handlebars::new();
        register_fallback_template(&mut handlebars);
        load_templates_from_dir(&mut handlebars, temp.path()).unwrap();

        let rendered = handlebars
            .render(COVERAGE_TEMPLATE_NAME, &json!({ "files": ["a.cpp", "b.cpp"] }))
            .unwrap();
        assert_eq!(rendered, "<li>a.cpp</li><li>b.cpp</li>");
    }

    #[cfg(unix)]
    #[test]
    fn invalid_template_filename_is_rejected() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let temp = tempdir().unwrap();
        let invalid = OsString::from_vec(vec![0xFF, b'.', b'h', b'b', b's']);
        std::fs::write(temp.path().join(&invalid), "{{this}}").unwrap();

        let mut handlebars = Handlebars::new();
        let err = load_templates_from_dir(&mut handlebars, temp.path()).unwrap_err();
        assert!(
            err.to_string().contains("Invalid template filename"),
            "unexpected error: {err:?}"
        );
    }
}
