//! # qualgate-rs: Quality Gate Decision Engine
//!
//! Decides whether an embedded firmware codebase may proceed through CI by
//! combining two signals:
//!
//! - **Coverage**: per-file line/branch/function coverage measured in a
//!   mandatory primary environment and an optional secondary environment,
//!   merged into one integrated figure and compared with a threshold.
//! - **Static analysis**: defects bucketed into high/medium/low severity,
//!   filtered by path exclusions and compared with per-severity limits.
//!
//! The gate passes only when both signals pass. Every run renders reports,
//! appends to a bounded history log and prunes old reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    QualityGate (coordinator)                 │
//! ├──────────────┬───────────────┬──────────────┬────────────────┤
//! │  Measurement │  Gate logic   │  Recording   │  Reports       │
//! │ • gcovr      │ • merge       │ • history    │ • HTML         │
//! │ • pio check  │ • severity    │ • baseline   │ • Cobertura    │
//! │ • probes     │ • thresholds  │ • retention  │ • JSON         │
//! └──────────────┴───────────────┴──────────────┴────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qualgate_rs::{QualgateConfig, QualityGate, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = QualgateConfig::from_file("qualgate.yml")?;
//!     let gate = QualityGate::from_config(config)?;
//!
//!     let outcome = gate.run(RunMode::Full).await?;
//!     println!("gate passed: {}", outcome.passed());
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Configuration and error handling
pub mod core {
    //! Configuration and error types.

    pub mod config;
    pub mod errors;
}

// Gate decision logic
pub mod gate {
    //! Coverage merging, defect classification, threshold evaluation and the
    //! run coordinator.

    pub mod baseline;
    pub mod coordinator;
    pub mod coverage;
    pub mod history;
    pub mod retention;
    pub mod severity;
    pub mod thresholds;
}

// External tool adapters
pub mod measure;

// Report rendering
pub mod io {
    //! Report output.

    pub mod reports;
}

// Re-export primary types for convenience
pub use core::config::QualgateConfig;
pub use core::errors::{QualgateError, Result, ResultExt};
pub use gate::coordinator::{GateOutcome, QualityGate, RunMode};
pub use gate::coverage::{CoverageSample, SecondaryMeasurement};
pub use gate::thresholds::CombinedVerdict;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
