//! Logging infrastructure for cellfix.
//!
//! Provides structured logging with file output and optional console output:
//! - Writes to `~/.cellfix/cellfix.log` by default (cleared on start)
//! - Also prints to stdout when attached to a terminal
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Logging options resolved by the CLI.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Full path of the log file.
    pub file: PathBuf,
    /// Mirror log lines to stdout.
    pub stdout: bool,
    /// Default to DEBUG instead of INFO when RUST_LOG is not set.
    pub debug: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            file: crate::config::default_log_file(),
            stdout: true,
            debug: false,
        }
    }
}

/// Initialize the global subscriber.
///
/// Creates the log directory if needed, clears the previous log file and
/// installs a file layer plus an optional stdout layer.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, io::Error> {
    let (dir, file_name) = prepare_log_file(&options.file)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    let default_level = if options.debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Create the parent directory and truncate the log file.
///
/// Returns the directory and file name the appender should use.
fn prepare_log_file(path: &Path) -> Result<(PathBuf, PathBuf), io::Error> {
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&dir)?;
    fs::write(path, "")?;
    Ok((dir, file_name))
}
