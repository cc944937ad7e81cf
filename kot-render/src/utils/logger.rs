//! Logging Infrastructure
//!
//! Console output (pretty or JSON, on stderr so stdout can carry job
//! bytes) plus an optional daily rolling file.
//! `RUST_LOG` overrides the configured level when set.

use std::fs;
use std::path::Path;

use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Prefix of the rolling log files: `kot-render.log.YYYY-MM-DD`
const LOG_FILE_PREFIX: &str = "kot-render.log";

/// Initialize the logger with defaults (info, console only)
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file("info", false, None)
}

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Log level or filter directive (e.g. "info", "kot_render=debug")
/// * `json_format` - JSON lines instead of human-readable output
/// * `log_dir` - Directory for the daily rolling file, console only when `None`
pub fn init_logger_with_file(level: &str, json_format: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if json_format {
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    }

    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_ansi(false)
                .with_writer(file_appender)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;
    Ok(())
}

/// Delete rolled log files older than `days`
///
/// Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, days: i64) -> anyhow::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(days);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date_part) = name
            .strip_prefix(LOG_FILE_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            && let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_only_old_rolled_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = format!("{}.2001-01-01", LOG_FILE_PREFIX);
        let today = format!(
            "{}.{}",
            LOG_FILE_PREFIX,
            chrono::Local::now().date_naive().format("%Y-%m-%d")
        );
        for name in [old.as_str(), today.as_str(), "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        assert_eq!(cleanup_old_logs(dir.path(), 14).unwrap(), 1);
        assert!(!dir.path().join(&old).exists());
        assert!(dir.path().join(&today).exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), 14).unwrap(), 0);
    }
}
