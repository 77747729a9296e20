//! `paxchat-node run <id> <target_host> <target_port>`. Config layers as
//! TOML file, then environment variables, then CLI flags, highest
//! priority last.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::NodeSettings;
use crate::generator::EchoGenerator;
use crate::node::Node;

use super::logging;

#[derive(Parser, Debug)]
pub struct Args {
    /// This node's logical id, `0 <= id < num_servers`.
    pub id: i64,
    /// Relay host to dial.
    pub target_host: String,
    /// Relay's listening port.
    pub target_port: u16,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "PAXCHAT_NUM_SERVERS")]
    pub num_servers: Option<usize>,

    #[arg(long, default_value = "./logs")]
    pub log_dir: PathBuf,

    #[arg(long, default_value = "100")]
    pub log_max_size_mb: u64,

    #[arg(long, default_value = "10")]
    pub log_max_files: usize,
}

pub async fn execute(args: Args) -> anyhow::Result<()> {
    let mut settings = match &args.config {
        Some(path) if path.exists() => NodeSettings::from_file(path)?,
        _ => NodeSettings::minimal(args.id, args.target_host.clone(), args.target_port),
    };

    settings.id = args.id;
    settings.target_host = args.target_host;
    settings.target_port = args.target_port;
    if let Some(num_servers) = args.num_servers {
        settings.num_servers = num_servers;
    }
    settings.validate()?;

    logging::init_logging(logging::LoggingConfig {
        log_dir: args.log_dir,
        max_size_mb: args.log_max_size_mb,
        max_files: args.log_max_files,
    })?;

    if std::env::var("GEMINI_API_KEY").is_err() {
        anyhow::bail!("GEMINI_API_KEY must be set to start a node");
    }

    tracing::info!(id = settings.id, target = %settings.target_host, port = settings.target_port, "starting paxchat node");

    let node = Arc::new(Node::new(settings, Arc::new(EchoGenerator)));
    node.start().await?;

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if !line.trim().is_empty() => {
                        match node.handle_cli_line(line.trim()).await {
                            Ok(Some(output)) => println!("{output}"),
                            Ok(None) => {}
                            Err(e) => tracing::warn!(error = %e, line = %line, "ignoring malformed node command"),
                        }
                        if !node.is_running() {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    node.stop().await;
    Ok(())
}
