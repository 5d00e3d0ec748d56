use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depfetch")]
#[command(about = "Dependency download worker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker, the status drain and the HTTP surface
    Run(ConfigArgs),
    /// Load and validate configuration, then print the effective settings
    CheckConfig(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// TOML configuration file (overrides DEPFETCH_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
