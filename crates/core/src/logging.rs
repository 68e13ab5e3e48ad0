//! Process logging for embedders of the container.

use crate::error::{ContainerError, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// `~/.enclave/logs`, or `./.enclave/logs` without a home directory.
pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".enclave")
        .join("logs")
}

/// Installs the global subscriber logging to [`log_dir`]. Failures are
/// ignored; keep the guard alive for as long as lines should reach the file.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<WorkerGuard> {
    try_init_logging(&log_dir(), component, to_stderr).ok()
}

/// Daily-rolling `<dir>/<component>.log.<date>` plus optional stderr output.
/// `RUST_LOG` selects levels, `info` by default.
pub fn try_init_logging(dir: &Path, component: &str, to_stderr: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, format!("{}.log", component));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let stderr_layer = to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ContainerError::configuration(format!("logging already initialized: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_log_dir_is_io_error() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, "").unwrap();

        let result = try_init_logging(&file.join("logs"), "container", false);
        assert!(matches!(result, Err(ContainerError::Io(_))));
    }

    #[test]
    fn test_log_file_is_created_once() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("logs");

        let guard = try_init_logging(&dir, "container", false).unwrap();
        tracing::info!("container logging ready");
        drop(guard);

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("container.log")));

        assert!(matches!(
            try_init_logging(&dir, "container", false),
            Err(ContainerError::Configuration(_))
        ));
    }
}
