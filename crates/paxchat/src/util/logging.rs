//! Decision logging: appends every `DECIDE`d command to a JSONL file, via
//! a background writer task fed by an unbounded channel and a
//! `{node_id}`-templated log directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_decisions_file")]
    pub decisions_file: String,
}

fn default_enabled() -> bool {
    true
}

fn default_log_dir() -> String {
    "logs/{node_id}".into()
}

fn default_decisions_file() -> String {
    "decisions.jsonl".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            log_dir: default_log_dir(),
            decisions_file: default_decisions_file(),
        }
    }
}

impl LogConfig {
    pub fn resolve_log_dir(&self, node_id: &str) -> PathBuf {
        PathBuf::from(self.log_dir.replace("{node_id}", node_id))
    }

    pub fn decisions_path(&self, node_id: &str) -> PathBuf {
        self.resolve_log_dir(node_id).join(&self.decisions_file)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionEntry {
    pub seq: u64,
    pub slot: i64,
    pub command: String,
    pub decided_at: String,
}

enum LogMessage {
    Entry(String),
    Shutdown,
}

/// Appends one JSONL line per applied `DECIDE`, on a dedicated writer task
/// so a slow disk never blocks the consensus loop.
#[derive(Clone)]
pub struct DecisionLogger {
    sender: mpsc::UnboundedSender<LogMessage>,
    seq: Arc<AtomicU64>,
}

impl DecisionLogger {
    pub fn new(config: &LogConfig, node_id: &str) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let log_dir = config.resolve_log_dir(node_id);
        let log_path = config.decisions_path(node_id);

        if let Err(e) = fs::create_dir_all(&log_dir) {
            tracing::warn!(path = %log_dir.display(), error = %e, "failed to create decision log directory");
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %log_path.display(), error = %e, "failed to open decision log file");
                return None;
            }
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let seq = Arc::new(AtomicU64::new(0));

        let path_for_task = log_path.clone();
        tokio::spawn(async move {
            writer_task(receiver, file, path_for_task).await;
        });

        tracing::info!(path = %log_path.display(), "decision logger initialized");
        Some(Self { sender, seq })
    }

    pub fn log(&self, slot: i64, command: &str) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = DecisionEntry {
            seq,
            slot,
            command: command.to_string(),
            decided_at: monotonic_timestamp(),
        };

        let line = match serde_json::to_string(&entry) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize decision log entry");
                return;
            }
        };

        if self.sender.send(LogMessage::Entry(line)).is_err() {
            tracing::warn!(seq, "decision log channel closed, entry dropped");
        }
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(LogMessage::Shutdown);
    }
}

async fn writer_task(mut receiver: mpsc::UnboundedReceiver<LogMessage>, file: File, path: PathBuf) {
    let mut writer = BufWriter::new(file);

    while let Some(msg) = receiver.recv().await {
        match msg {
            LogMessage::Entry(line) => {
                if let Err(e) = writeln!(writer, "{line}") {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write decision log entry");
                }
                if let Err(e) = writer.flush() {
                    tracing::warn!(path = %path.display(), error = %e, "failed to flush decision log");
                }
            }
            LogMessage::Shutdown => {
                let _ = writer.flush();
                break;
            }
        }
    }
}

fn monotonic_timestamp() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}Z", now.as_secs(), now.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn path_templating_substitutes_node_id() {
        let config = LogConfig::default();
        assert_eq!(
            config.resolve_log_dir("node-0"),
            PathBuf::from("logs/node-0")
        );
    }

    #[tokio::test]
    async fn logger_writes_entries() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            enabled: true,
            log_dir: dir.path().to_string_lossy().to_string(),
            decisions_file: "test.jsonl".into(),
        };

        let logger = DecisionLogger::new(&config, "node-0").unwrap();
        logger.log(0, "create 7");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        logger.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert!(contents.contains("create 7"));
    }

    #[test]
    fn disabled_logger_returns_none() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(DecisionLogger::new(&config, "node-0").is_none());
    }
}
