//! `paxchat-relay` binary entry point. Requires the `cli` feature.

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = paxchat::cli::relay::Args::parse();
    paxchat::cli::relay::execute(args).await
}
