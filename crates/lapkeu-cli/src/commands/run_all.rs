use super::{build_orchestrator, failures, load_config, print_summary, resolve_period};
use crate::Cli;
use anyhow::{Result, bail};

pub async fn execute(cli: &Cli, month: Option<u32>, year: Option<i32>) -> Result<()> {
    let config = load_config(cli)?;
    let period = resolve_period(month, year)?;

    tracing::info!("Running all phases for {}", period);
    let (orchestrator, _cancel) = build_orchestrator(&config);

    let runs = orchestrator.run_all_phases(Some(period)).await?;

    print_summary(&runs);
    let failed = failures(&runs);
    if failed > 0 {
        bail!("{} phase(s) failed", failed);
    }
    Ok(())
}
