use clap::{Parser, Subcommand, ValueEnum};
use lapkeu_core::Phase;
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "lapkeu")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Retrieves quarterly publication report tables from the regulator's site",
    long_about = "Drives the regulator's postback-style report form phase by phase, \
                  extracts the rendered tables and upserts them into a per-period workbook."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run the browser with a visible window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Workbook output directory
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Chrome binary location
    #[arg(long, global = true)]
    pub chrome_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one phase (or all phases) for a period
    Run {
        /// Phase to run
        #[arg(value_enum)]
        phase: PhaseArg,

        /// Quarter-end month (3, 6, 9 or 12); defaults to the current period
        #[arg(long, requires = "year")]
        month: Option<u32>,

        /// Report year
        #[arg(long, requires = "month")]
        year: Option<i32>,
    },

    /// Run all phases in order and report every outcome
    RunAll {
        /// Quarter-end month (3, 6, 9 or 12); defaults to the current period
        #[arg(long, requires = "year")]
        month: Option<u32>,

        /// Report year
        #[arg(long, requires = "month")]
        year: Option<i32>,
    },

    /// Trigger run-all on a weekly cadence
    Schedule {
        /// Weekday to run on
        #[arg(long, value_enum, default_value = "tue")]
        weekday: WeekdayArg,

        /// Time of day, 24h HH:MM
        #[arg(long, default_value = "15:00")]
        at: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PhaseArg {
    First,
    Second,
    Third,
    All,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::First => Phase::First,
            PhaseArg::Second => Phase::Second,
            PhaseArg::Third => Phase::Third,
            PhaseArg::All => Phase::All,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WeekdayArg {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<WeekdayArg> for chrono::Weekday {
    fn from(arg: WeekdayArg) -> Self {
        match arg {
            WeekdayArg::Mon => chrono::Weekday::Mon,
            WeekdayArg::Tue => chrono::Weekday::Tue,
            WeekdayArg::Wed => chrono::Weekday::Wed,
            WeekdayArg::Thu => chrono::Weekday::Thu,
            WeekdayArg::Fri => chrono::Weekday::Fri,
            WeekdayArg::Sat => chrono::Weekday::Sat,
            WeekdayArg::Sun => chrono::Weekday::Sun,
        }
    }
}
