use crate::extract::ExtractionResult;
use crate::period::ReportPeriod;
use crate::phase::{FormSelection, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a phase ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    /// A synchronization wait lapsed and the retry budget is spent.
    SyncTimeout,
    /// A required field's locator never matched.
    ElementNotFound,
    /// Rate limiting suspected and the backoff budget is spent. Callers
    /// should apply a longer cool-down before the next scheduled attempt.
    RateLimited,
    /// The browser process died and fresh sessions kept failing.
    SessionCrash,
    /// Extraction succeeded but the workbook handoff did not.
    Finalization,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailReason::SyncTimeout => "sync timeout",
            FailReason::ElementNotFound => "element not found",
            FailReason::RateLimited => "rate limited",
            FailReason::SessionCrash => "session crash",
            FailReason::Finalization => "finalization failed",
        };
        write!(f, "{}", s)
    }
}

/// Terminal result of one phase. `NoData` is success-shaped: the site had
/// nothing to report for the selection, which is not a failure of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseOutcome {
    Success,
    NoData,
    Failed(FailReason),
}

impl PhaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PhaseOutcome::Failed(_))
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseOutcome::Success => write!(f, "success"),
            PhaseOutcome::NoData => write!(f, "no data"),
            PhaseOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Record of one phase execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRun {
    pub phase: Phase,
    pub period: ReportPeriod,
    pub selection: FormSelection,
    pub result: ExtractionResult,
    pub attempts: u32,
    pub outcome: PhaseOutcome,
}

impl PhaseRun {
    pub fn failed(
        phase: Phase,
        period: ReportPeriod,
        selection: FormSelection,
        attempts: u32,
        reason: FailReason,
    ) -> Self {
        Self {
            phase,
            period,
            selection,
            result: ExtractionResult::default(),
            attempts,
            outcome: PhaseOutcome::Failed(reason),
        }
    }
}
