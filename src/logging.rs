use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "nhlstat=info";

/// Install the global subscriber.
///
/// Logs go to a daily rolling file under `log_dir` when given, otherwise to
/// stderr. Keep the returned guard alive until exit so buffered lines are
/// flushed.
pub fn init(log_dir: Option<&Path>) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let (writer, guard) = match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(dir).map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("nhlstat")
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| eyre!("Failed to open log file in {}: {}", dir.display(), e))?;
      tracing_appender::non_blocking(appender)
    }
    None => tracing_appender::non_blocking(std::io::stderr()),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(log_dir.is_none())
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}
