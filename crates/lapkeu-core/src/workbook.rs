use crate::extract::ExtractionResult;
use crate::period::ReportPeriod;
use crate::phase::Phase;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("Failed to write sheet: {0}")]
    Io(#[from] std::io::Error),

    #[error("Phase {0} has no output sheet")]
    NoSheet(Phase),
}

/// Workbook handoff for a finished phase.
///
/// Contract: idempotent upsert into the per-period workbook at the phase's
/// designated sheet. Must not be called before the phase's session is closed;
/// the orchestrator enforces that ordering.
pub trait Finalize {
    fn finalize(
        &self,
        phase: Phase,
        period: ReportPeriod,
        result: &ExtractionResult,
    ) -> std::result::Result<(), FinalizeError>;
}

/// Per-period workbook directory with one CSV sheet per phase.
///
/// Re-running a phase overwrites only its own sheet, so a failed phase leaves
/// the other phases' finalized sheets untouched.
pub struct Workbook {
    root: PathBuf,
}

impl Workbook {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the sheet a phase finalizes into.
    pub fn sheet_path(&self, phase: Phase, period: ReportPeriod) -> Option<PathBuf> {
        let sheet = phase.sheet_name()?;
        Some(
            self.root
                .join(format!("Publikasi_{}", period.tag()))
                .join(format!("{}.csv", sheet)),
        )
    }

    fn write_sheet(&self, path: &Path, result: &ExtractionResult) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for row in &result.rows {
            write_csv_row(&mut writer, row)?;
        }
        writer.flush()
    }
}

impl Finalize for Workbook {
    fn finalize(
        &self,
        phase: Phase,
        period: ReportPeriod,
        result: &ExtractionResult,
    ) -> std::result::Result<(), FinalizeError> {
        let path = self
            .sheet_path(phase, period)
            .ok_or(FinalizeError::NoSheet(phase))?;

        tracing::debug!("Writing {} rows to {}", result.rows.len(), path.display());
        self.write_sheet(&path, result)?;
        tracing::info!(
            "Finalized phase {} for {} into {}",
            phase,
            period,
            path.display()
        );
        Ok(())
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_csv_row<W: Write>(writer: &mut W, row: &[String]) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(writer, ",")?;
        }
        first = false;
        if needs_quotes(cell) {
            write!(writer, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(writer, "{}", cell)?;
        }
    }
    writeln!(writer)
}
