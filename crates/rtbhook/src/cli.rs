use clap::{Parser, Subcommand};
use rtb_hooks::{Endpoint, Stage};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rtbhook")]
#[command(about = "Run and inspect bid request hook execution plans", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new config file
    Init {
        /// Path for new config file
        #[arg(default_value = "rtbhook.toml")]
        path: PathBuf,
    },
    /// Check an execution plan against the built-in modules
    ValidatePlan {
        /// Path to plan JSON file
        #[arg(long)]
        file: PathBuf,
    },
    /// Run one stage of the configured plan over a payload
    RunStage {
        /// Stage name, e.g. raw_auction_request
        #[arg(long)]
        stage: Stage,
        /// Path to the stage payload JSON file
        #[arg(long)]
        payload: PathBuf,
        /// Path to the account JSON file
        #[arg(long)]
        account: Option<PathBuf>,
        /// Endpoint the request arrived on
        #[arg(long, default_value = "/openrtb2/auction")]
        endpoint: Endpoint,
        /// Bidder code, required by per-bidder stages
        #[arg(long)]
        bidder: Option<String>,
    },
}
