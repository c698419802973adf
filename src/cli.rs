//! CLI for the Pulse server.

use clap::{Parser, Subcommand};

/// Pulse workforce ledger CLI
#[derive(Parser, Debug)]
#[command(name = "pulse")]
#[command(about = "Workforce session and runtime-metrics ledger")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve {
        /// Bind address, overrides configuration
        #[arg(long)]
        host: Option<String>,
        /// Port, overrides configuration
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve { host, port }) => crate::server::run(host, port).await,
        None => crate::server::run(None, None).await,
    }
}
