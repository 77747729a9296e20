//! `paxchat-relay` — invoked as `<relay> <base_port> <num_servers>`,
//! reads operator commands from stdin.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::relay::{OperatorCommand, Relay, MIN_FORWARD_DELAY};

use super::logging;

#[derive(Parser, Debug)]
pub struct Args {
    pub base_port: u16,
    pub num_servers: usize,

    #[arg(long)]
    pub forward_delay_ms: Option<u64>,

    #[arg(long, default_value = "./logs")]
    pub log_dir: PathBuf,

    #[arg(long, default_value = "100")]
    pub log_max_size_mb: u64,

    #[arg(long, default_value = "10")]
    pub log_max_files: usize,
}

pub async fn execute(args: Args) -> anyhow::Result<()> {
    logging::init_logging(logging::LoggingConfig {
        log_dir: args.log_dir,
        max_size_mb: args.log_max_size_mb,
        max_files: args.log_max_files,
    })?;

    let forward_delay = args
        .forward_delay_ms
        .map(Duration::from_millis)
        .unwrap_or(MIN_FORWARD_DELAY);

    let relay = Arc::new(Relay::new(args.base_port, args.num_servers, forward_delay));

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let relay_task = tokio::spawn(relay.clone().run(cmd_rx));

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if !line.trim().is_empty() => {
                        match OperatorCommand::parse(line.trim()) {
                            Ok(cmd) => {
                                let is_exit = matches!(cmd, OperatorCommand::Exit);
                                if cmd_tx.send(cmd).await.is_err() || is_exit {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, line = %line, "ignoring malformed relay command"),
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(OperatorCommand::Exit).await;
                break;
            }
        }
    }

    drop(cmd_tx);
    let _ = relay_task.await;
    Ok(())
}
