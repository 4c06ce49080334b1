//! cellfix CLI - Command-line interface
//!
//! Runs the positioning daemon against a scan file, performs one-shot
//! online lookups and manages `~/.cellfix/config.ini`.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "cellfix")]
#[command(version, about = "Cell tower and WLAN based positioning", long_about = None)]
struct Cli {
    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the position provider and print status and position changes
    Run {
        /// JSON scan file with the visible cells and access points
        #[arg(long)]
        scan_file: Option<PathBuf>,

        /// Requested update interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Look up the current scan online once and print the coordinates
    Lookup {
        /// JSON scan file with the visible cells and access points
        #[arg(long)]
        scan_file: Option<PathBuf>,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Run {
            scan_file,
            interval,
        } => commands::run::run(commands::run::RunArgs {
            scan_file,
            interval,
            debug: cli.debug,
        }),
        Commands::Lookup { scan_file } => commands::lookup::run(commands::lookup::LookupArgs {
            scan_file,
            debug: cli.debug,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_options() {
        let cli = Cli::try_parse_from([
            "cellfix",
            "--debug",
            "run",
            "--scan-file",
            "/tmp/scan.json",
            "--interval",
            "5000",
        ])
        .unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Run {
                scan_file,
                interval,
            } => {
                assert_eq!(scan_file, Some(PathBuf::from("/tmp/scan.json")));
                assert_eq!(interval, Some(5000));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["cellfix", "config", "set", "online.api_key", "k"]).unwrap();
        assert!(!cli.debug);
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }
}
