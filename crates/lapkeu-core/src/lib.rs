pub mod config;
pub mod error;
pub mod extract;
pub mod locator;
pub mod outcome;
pub mod period;
pub mod phase;
pub mod workbook;

pub use config::Config;
pub use error::{Error, Result};
pub use extract::{ExtractionResult, extract_region};
pub use locator::{Action, Locator};
pub use outcome::{FailReason, PhaseOutcome, PhaseRun};
pub use period::ReportPeriod;
pub use phase::{FormSelection, Phase, ReportCategory};
pub use workbook::{Finalize, FinalizeError, Workbook};
