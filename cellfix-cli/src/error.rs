//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use cellfix::config::ConfigFileError;
use cellfix::locator::{LookupError, TransportError};
use cellfix::provider::ProviderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read or write the configuration file
    ConfigFile(ConfigFileError),
    /// No scan file configured or given
    NoScanSource,
    /// The scan holds nothing that may be sent to the location service
    EmptyScan(String),
    /// Failed to create the HTTP transport
    Transport(TransportError),
    /// Online lookup failed
    Lookup(LookupError),
    /// Provider daemon error
    Provider(ProviderError),
    /// Failed to start the async runtime or install a signal handler
    Runtime(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::NoScanSource => {
                eprintln!();
                eprintln!("Pass --scan-file PATH, or set it once with:");
                eprintln!("  cellfix config set scan.file ~/scan.json");
            }
            CliError::Lookup(LookupError::InvalidKey) => {
                eprintln!();
                eprintln!("The location service rejected the API key. Check it with:");
                eprintln!("  cellfix config get online.api_key");
            }
            CliError::Lookup(LookupError::QuotaExceeded) => {
                eprintln!();
                eprintln!("The API key ran out of quota. Lookups resume once it is renewed.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::NoScanSource => write!(f, "No scan file configured"),
            CliError::EmptyScan(path) => {
                write!(f, "Scan file {} has no observations to look up", path)
            }
            CliError::Transport(e) => write!(f, "Failed to create HTTP transport: {}", e),
            CliError::Lookup(e) => write!(f, "Online lookup failed: {}", e),
            CliError::Provider(e) => write!(f, "Provider error: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Transport(e) => Some(e),
            CliError::Lookup(e) => Some(e),
            CliError::Provider(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Transport(e)
    }
}

impl From<LookupError> for CliError {
    fn from(e: LookupError) -> Self {
        CliError::Lookup(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Provider(e)
    }
}
