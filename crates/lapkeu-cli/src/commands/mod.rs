use crate::Cli;
use anyhow::{Context, Result};
use console::style;
use lapkeu_browser::{Orchestrator, PostbackDriver, RateLimiter};
use lapkeu_core::{Config, PhaseOutcome, PhaseRun, ReportPeriod, Workbook};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod run;
pub mod run_all;
pub mod schedule;

/// Merge the config file (if any) with command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    if cli.headed {
        config.headless = false;
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(chrome_path) = &cli.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Wire the production stack: rate limiter, postback driver, workbook
/// finalizer. Ctrl-C trips the cancellation token; teardown still runs
/// before the abort surfaces.
pub fn build_orchestrator(
    config: &Config,
) -> (
    Orchestrator<PostbackDriver, Workbook>,
    CancellationToken,
) {
    let cancel = CancellationToken::new();
    let limiter = Arc::new(RateLimiter::new(config));
    let driver = PostbackDriver::new(config.clone(), Arc::clone(&limiter), cancel.clone());
    let finalizer = Workbook::new(config.output_dir.clone());

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing teardown before exit");
            signal_token.cancel();
        }
    });

    (
        Orchestrator::new(driver, finalizer, limiter, config.clone(), cancel.clone()),
        cancel,
    )
}

/// Resolve the period from explicit arguments, or compute the current one.
pub fn resolve_period(month: Option<u32>, year: Option<i32>) -> Result<ReportPeriod> {
    match (month, year) {
        (Some(month), Some(year)) => Ok(ReportPeriod::new(month, year)?),
        _ => Ok(ReportPeriod::current()),
    }
}

/// Per-run completion summary, one line per phase.
pub fn print_summary(runs: &[PhaseRun]) {
    println!();
    println!("{}", style("Run summary").bold());
    for run in runs {
        let outcome = match run.outcome {
            PhaseOutcome::Success => style(run.outcome.to_string()).green(),
            PhaseOutcome::NoData => style(run.outcome.to_string()).yellow(),
            PhaseOutcome::Failed(_) => style(run.outcome.to_string()).red(),
        };
        println!(
            "  {:<8} {}: {} ({} rows, {} attempt(s))",
            run.phase.to_string(),
            run.period,
            outcome,
            run.result.row_count(),
            run.attempts
        );
    }
}

/// Count of failed phases, for the process exit status.
pub fn failures(runs: &[PhaseRun]) -> usize {
    runs.iter().filter(|r| r.outcome.is_failure()).count()
}
