use super::{build_orchestrator, failures, load_config, print_summary, resolve_period};
use crate::{Cli, PhaseArg};
use anyhow::{Result, bail};
use lapkeu_core::Phase;

pub async fn execute(cli: &Cli, phase: PhaseArg, month: Option<u32>, year: Option<i32>) -> Result<()> {
    let config = load_config(cli)?;
    let period = resolve_period(month, year)?;
    let phase = Phase::from(phase);

    tracing::info!("Running phase {} for {}", phase, period);
    let (orchestrator, _cancel) = build_orchestrator(&config);

    let runs = if phase == Phase::All {
        orchestrator.run_all_phases(Some(period)).await?
    } else {
        vec![orchestrator.run_phase(period, phase).await?]
    };

    print_summary(&runs);
    let failed = failures(&runs);
    if failed > 0 {
        bail!("{} phase(s) failed", failed);
    }
    Ok(())
}
