//! Coverage baseline snapshot.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::errors::{Result, ResultExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub timestamp: DateTime<Local>,
    /// Integrated coverage at baseline time
    pub baseline_coverage: f64,
    /// Primary environment coverage at baseline time
    pub pure_coverage: f64,
}

impl Baseline {
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write baseline {}", path.display()))?;
        info!(
            "Baseline recorded: {:.1}% ({})",
            self.baseline_coverage,
            path.display()
        );
        Ok(())
    }

    /// Previously recorded baseline, if one can be read.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read baseline {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::QualgateError;
    use tempfile::tempdir;

    #[test]
    fn baseline_is_persisted_with_documented_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coverage_baseline.json");
        let baseline = Baseline {
            timestamp: Local::now(),
            baseline_coverage: 81.5,
            pure_coverage: 78.0,
        };

        baseline.write(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["baseline_coverage"], 81.5);
        assert_eq!(raw["pure_coverage"], 78.0);
        assert!(raw["timestamp"].is_string());
        assert_eq!(Baseline::load(&path).unwrap(), baseline);
    }

    #[test]
    fn missing_baseline_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = Baseline::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, QualgateError::Io { .. }));
        assert!(err.to_string().contains("Failed to read baseline"));
    }
}
