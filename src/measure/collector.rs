//! Seams between the gate and the external measurement tools.

use async_trait::async_trait;

use crate::core::errors::Result;
use crate::gate::coverage::CoverageSample;
use crate::gate::severity::ToolRun;

/// Produces a coverage sample for one environment
#[async_trait]
pub trait CoverageCollector: Send + Sync {
    /// Measure `environment`. Any error means the environment could not be
    /// measured; the caller decides whether that is fatal.
    async fn collect(&self, environment: &str) -> Result<CoverageSample>;
}

/// Produces the static-analysis defect batch
#[async_trait]
pub trait DefectCollector: Send + Sync {
    /// Analyzer name reported in verdicts
    fn tool(&self) -> &str;

    /// Run the analyzer against `environment`
    async fn collect(&self, environment: &str) -> Result<Vec<ToolRun>>;
}
