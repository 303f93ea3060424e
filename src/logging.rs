use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Path of the log file for a run started at `started`:
/// `{log_dir}/{log_name}-%Y%m%d-%H%M%S.log`.
pub fn log_file_path(config: &LoggingConfig, started: chrono::DateTime<chrono::Local>) -> PathBuf {
    config.log_dir.join(format!(
        "{}-{}.log",
        config.log_name,
        started.format("%Y%m%d-%H%M%S")
    ))
}

/// Filter from `RUST_LOG` if set, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()))
}

/// Install the global subscriber: stderr plus a per-run log file.
///
/// Keep the returned guard alive for the whole process; dropping it flushes
/// and closes the file writer.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("failed to create {}", config.log_dir.display()))?;
    let path = log_file_path(config, chrono::Local::now());
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_file_is_named_after_start_time() {
        let config = LoggingConfig {
            log_dir: PathBuf::from("logs"),
            log_name: "client".into(),
            log_level: "INFO".into(),
        };
        let started = chrono::Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            log_file_path(&config, started),
            PathBuf::from("logs/client-20240102-030405.log")
        );
    }
}
