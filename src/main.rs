//! Flotilla - Main Entry Point

use clap::Parser;
use flotilla::cli::{cmd_defaults, cmd_score, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flotilla=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score(args) => {
            cmd_score(&args)?;
        }
        Commands::Defaults => {
            cmd_defaults()?;
        }
    }

    Ok(())
}
