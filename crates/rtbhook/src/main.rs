mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    rtb_hooks::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            commands::init::run_init(&path)?;
        }
        Commands::ValidatePlan { file } => {
            commands::validate_plan::execute(&file)?;
        }
        Commands::RunStage {
            stage,
            payload,
            account,
            endpoint,
            bidder,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            let args = commands::run_stage::RunStageArgs {
                stage,
                payload,
                account,
                endpoint,
                bidder,
            };
            commands::run_stage::execute(args, &config).await?;
        }
    }

    Ok(())
}
