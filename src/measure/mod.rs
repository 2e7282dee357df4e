//! External measurement: coverage via gcovr, defects via `pio check`.

pub mod collector;
pub mod command;
pub mod gcovr;
pub mod pio_check;
pub mod probe;

pub use collector::{CoverageCollector, DefectCollector};
pub use gcovr::GcovrCoverageCollector;
pub use pio_check::PioCheckCollector;
