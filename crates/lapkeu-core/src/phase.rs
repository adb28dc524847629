use crate::locator::Locator;
use crate::period::ReportPeriod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One report-category submission, or the combined run of all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    First,
    Second,
    Third,
    All,
}

impl Phase {
    /// The three single phases in their required output order.
    pub const SINGLES: [Phase; 3] = [Phase::First, Phase::Second, Phase::Third];

    /// The report category a single phase submits. `All` has no category of
    /// its own; it expands to the three singles.
    pub fn category(&self) -> Option<ReportCategory> {
        match self {
            Phase::First => Some(ReportCategory::BalanceSheet),
            Phase::Second => Some(ReportCategory::IncomeStatement),
            Phase::Third => Some(ReportCategory::AssetQuality),
            Phase::All => None,
        }
    }

    /// Workbook sheet a single phase finalizes into.
    pub fn sheet_name(&self) -> Option<&'static str> {
        self.category().map(|c| c.sheet_name())
    }

    /// Field selection for running this single phase in its own session.
    pub fn selection(&self, period: ReportPeriod) -> FormSelection {
        FormSelection {
            period,
            categories: self.category().into_iter().collect(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::First => "first",
            Phase::Second => "second",
            Phase::Third => "third",
            Phase::All => "all",
        };
        write!(f, "{}", name)
    }
}

/// Report category behind one of the form's tree checkboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportCategory {
    BalanceSheet,
    IncomeStatement,
    AssetQuality,
}

impl ReportCategory {
    /// Title text the site renders above the category's results region.
    pub fn title(&self) -> &'static str {
        match self {
            ReportCategory::BalanceSheet => "Laporan Posisi Keuangan",
            ReportCategory::IncomeStatement => "Laporan Laba Rugi",
            ReportCategory::AssetQuality => "Laporan Kualitas Aset Produktif",
        }
    }

    /// Locator for the category's checkbox. The id fragment survives
    /// re-renders even though the full id does not.
    pub fn checkbox(&self) -> Locator {
        let fragment = match self {
            ReportCategory::BalanceSheet => "chkLaporanPosisiKeuangan",
            ReportCategory::IncomeStatement => "chkLaporanLabaRugi",
            ReportCategory::AssetQuality => "chkLaporanKualitasAset",
        };
        Locator::attr(fragment)
    }

    /// Locator for the category's rendered results region title.
    pub fn region_anchor(&self) -> Locator {
        Locator::text(self.title())
    }

    pub fn sheet_name(&self) -> &'static str {
        match self {
            ReportCategory::BalanceSheet => "Posisi Keuangan",
            ReportCategory::IncomeStatement => "Laba Rugi",
            ReportCategory::AssetQuality => "Kualitas Aset Produktif",
        }
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// The set of field values applied within one browser session.
///
/// Category sets are mutually exclusive across sessions: a session carries
/// one category, except for the documented Second+Third shared run, which
/// carries exactly that pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSelection {
    pub period: ReportPeriod,
    pub categories: Vec<ReportCategory>,
}

impl FormSelection {
    /// Selection for the documented shared Second+Third session.
    pub fn shared_pair(period: ReportPeriod) -> Self {
        Self {
            period,
            categories: vec![
                ReportCategory::IncomeStatement,
                ReportCategory::AssetQuality,
            ],
        }
    }
}
