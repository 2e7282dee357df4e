//! Coverage and static-analysis report rendering.

mod error;
mod generator;
mod helpers;
mod templates;

pub use error::ReportError;
pub use generator::{RenderedReport, ReportFormat, ReportGenerator};
