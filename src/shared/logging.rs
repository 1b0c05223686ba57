use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the non-blocking writers flushing until dropped at the end of `main`.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    // Controlled via RUST_LOG
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn console_layer<S>(writer: NonBlocking) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
}

/// Initialize logging for the API service (file + console).
pub fn init_service_logging(log_dir: &str, service_name: &str) -> LoggingGuard {
    let can_write_logs = std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(format!("{log_dir}/.test_write")))
        .map(|_| std::fs::remove_file(format!("{log_dir}/.test_write")))
        .is_ok();

    let (stdout_writer, stdout_guard) = non_blocking(std::io::stdout());

    if !can_write_logs {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(console_layer(stdout_writer))
            .init();
        info!("Logging initialized - console output only (could not create {log_dir})");
        return LoggingGuard {
            _guards: vec![stdout_guard],
        };
    }

    if let Err(e) = rotate_logs_on_startup(log_dir, service_name) {
        eprintln!("Failed to rotate previous log file: {e}");
    }

    let file_appender =
        tracing_appender::rolling::never(log_dir, format!("{service_name}.log"));
    let (file_writer, file_guard) = non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer(stdout_writer))
        .init();

    info!("Logging initialized - logs will be written to {log_dir}/{service_name}.log");
    LoggingGuard {
        _guards: vec![file_guard, stdout_guard],
    }
}

/// Initialize logging for the CLI. Everything goes to stderr so stdout
/// carries only the answer.
pub fn init_cli_logging() -> LoggingGuard {
    let (stderr_writer, stderr_guard) = non_blocking(std::io::stderr());
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(stderr_writer)
                .with_target(false)
                .without_time(),
        )
        .init();
    LoggingGuard {
        _guards: vec![stderr_guard],
    }
}

pub fn rotate_logs_on_startup(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    let log_file = format!("{log_dir}/{service_name}.log");
    let log_path = Path::new(&log_file);

    if log_path.exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = format!("{log_dir}/{service_name}.{timestamp}.log");
        std::fs::rename(&log_file, &backup_file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_moves_existing_log_aside() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("svc.log"), "old").unwrap();

        rotate_logs_on_startup(log_dir, "svc").unwrap();

        assert!(!dir.path().join("svc.log").exists());
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("svc.") && name.ends_with(".log"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn rotation_without_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        rotate_logs_on_startup(dir.path().to_str().unwrap(), "svc").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
