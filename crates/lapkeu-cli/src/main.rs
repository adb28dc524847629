use anyhow::Result;
use clap::Parser;
use lapkeu_cli::{Cli, Commands, commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match &cli.command {
        Commands::Run { phase, month, year } => {
            commands::run::execute(&cli, *phase, *month, *year).await
        }
        Commands::RunAll { month, year } => commands::run_all::execute(&cli, *month, *year).await,
        Commands::Schedule { weekday, at } => {
            let at = at.clone();
            commands::schedule::execute(&cli, *weekday, &at).await
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("lapkeu=debug,lapkeu_core=debug,lapkeu_browser=debug")
    } else {
        EnvFilter::new("lapkeu=info,lapkeu_browser=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
