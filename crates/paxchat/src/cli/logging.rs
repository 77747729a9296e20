//! `tracing-subscriber` setup for the CLI binaries: a console layer plus
//! a rotating JSON file sink via `file-rotate`.

use std::path::PathBuf;

use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub max_size_mb: u64,
    pub max_files: usize,
}

struct RotatingWriter {
    writer: std::sync::Arc<std::sync::Mutex<FileRotate<AppendCount>>>,
}

impl RotatingWriter {
    fn new(path: PathBuf, max_size_mb: u64, max_files: usize) -> Self {
        let rotate = FileRotate::new(
            path,
            AppendCount::new(max_files),
            ContentLimit::Bytes((max_size_mb * 1024 * 1024) as usize),
            Compression::None,
            #[cfg(unix)]
            None,
        );
        RotatingWriter {
            writer: std::sync::Arc::new(std::sync::Mutex::new(rotate)),
        }
    }
}

impl<'a> fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriterGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterGuard {
            guard: self.writer.lock().unwrap(),
        }
    }
}

struct RotatingWriterGuard<'a> {
    guard: std::sync::MutexGuard<'a, FileRotate<AppendCount>>,
}

impl<'a> std::io::Write for RotatingWriterGuard<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.guard.flush()
    }
}

pub fn init_logging(config: LoggingConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_writer = RotatingWriter::new(
        config.log_dir.join("paxchat.jsonl"),
        config.max_size_mb,
        config.max_files,
    );

    let console_layer = fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::from_default_env().add_directive("paxchat=info".parse()?));

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(EnvFilter::from_default_env().add_directive("paxchat=debug".parse()?));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
