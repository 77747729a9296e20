//! `paxchat-node` binary entry point. Requires the `cli` feature.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "paxchat-node", version, about = "paxchat consensus node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(paxchat::cli::run::Args),
    Config(paxchat::cli::config::Args),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => paxchat::cli::run::execute(args).await,
        Commands::Config(args) => paxchat::cli::config::execute(args),
    }
}
