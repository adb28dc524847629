use crate::{Error, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical quarter-end a report run targets.
///
/// The regulator only publishes figures for the four quarter-end months, so a
/// period is always one of (3, y), (6, y), (9, y) or (12, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub month: u32,
    pub year: i32,
}

impl ReportPeriod {
    /// Create a period, rejecting months that are not quarter ends.
    pub fn new(month: u32, year: i32) -> Result<Self> {
        match month {
            3 | 6 | 9 | 12 => Ok(Self { month, year }),
            _ => Err(Error::InvalidPeriod(format!(
                "month {} is not a quarter end (expected 3, 6, 9 or 12)",
                month
            ))),
        }
    }

    /// Compute the period a given calendar date maps to.
    ///
    /// Publication lags one quarter: in Jan-Mar the newest available report
    /// is December of the previous year, in Apr-Jun it is March, and so on.
    pub fn for_date(date: NaiveDate) -> Self {
        let (month, year) = match date.month() {
            1..=3 => (12, date.year() - 1),
            4..=6 => (3, date.year()),
            7..=9 => (6, date.year()),
            _ => (9, date.year()),
        };
        Self { month, year }
    }

    /// Period for today's date.
    pub fn current() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    /// Month label as the report form's month dropdown renders it.
    pub fn month_label(&self) -> &'static str {
        match self.month {
            3 => "Maret",
            6 => "Juni",
            9 => "September",
            _ => "Desember",
        }
    }

    /// Directory-friendly tag, e.g. "12_2024".
    pub fn tag(&self) -> String {
        format!("{:02}_{}", self.month, self.year)
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_label(), self.year)
    }
}
