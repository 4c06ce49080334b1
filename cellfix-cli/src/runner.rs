//! CLI runner for common setup and operations.
//!
//! Loads the configuration, initializes logging and resolves the scan
//! source so command handlers only deal with their own work.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use cellfix::config::ConfigFile;
use cellfix::locator::ReqwestTransport;
use cellfix::logging::{init_logging, LoggingGuard, LoggingOptions};
use cellfix::provider::{ProviderDaemon, ProviderDaemonConfig, ProviderHandle};
use cellfix::sources::{AccessPointSource, CellSource, ScanFile};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner with optional debug logging.
    ///
    /// Log lines go to the log file. They are mirrored to stdout only when
    /// stdout is not a terminal, so interactive output stays readable.
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let options = LoggingOptions {
            file: config.logging.file.clone(),
            stdout: !atty::is(atty::Stream::Stdout),
            debug: debug_mode,
        };
        let logging_guard =
            init_logging(&options).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("cellfix v{}", cellfix::VERSION);
        info!("cellfix CLI: {} command", command);
    }

    /// Scan file from the command line, falling back to the configured one.
    pub fn scan_file(&self, override_path: Option<&Path>) -> Result<ScanFile, CliError> {
        resolve_scan_path(override_path, self.config.scan.file.as_deref())
            .map(ScanFile::new)
            .ok_or(CliError::NoScanSource)
    }

    /// HTTP transport honouring the configured reply timeout.
    pub fn create_transport(&self) -> Result<Arc<ReqwestTransport>, CliError> {
        let timeout = self.config.locator_config().reply_timeout;
        Ok(Arc::new(ReqwestTransport::with_timeout(timeout)?))
    }

    /// Build a provider daemon reading observations from `scan`.
    pub fn create_daemon(
        &self,
        scan: ScanFile,
    ) -> Result<(ProviderDaemon<ReqwestTransport>, ProviderHandle), CliError> {
        let transport = self.create_transport()?;
        let scan = Arc::new(scan);
        info!(scan_file = %scan.path().display(), "Creating provider daemon");

        Ok(ProviderDaemon::new(
            ProviderDaemonConfig::from_config_file(&self.config),
            Arc::clone(&scan) as Arc<dyn CellSource>,
            scan as Arc<dyn AccessPointSource>,
            transport,
        ))
    }
}

/// Pick the scan file: the explicit path wins over the configured one.
fn resolve_scan_path(override_path: Option<&Path>, configured: Option<&Path>) -> Option<PathBuf> {
    override_path.or(configured).map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_over_configured_scan_file() {
        let chosen = resolve_scan_path(Some(Path::new("/tmp/a.json")), Some(Path::new("/b.json")));
        assert_eq!(chosen, Some(PathBuf::from("/tmp/a.json")));
    }

    #[test]
    fn test_configured_scan_file_used_without_override() {
        let chosen = resolve_scan_path(None, Some(Path::new("/b.json")));
        assert_eq!(chosen, Some(PathBuf::from("/b.json")));
        assert_eq!(resolve_scan_path(None, None), None);
    }
}
