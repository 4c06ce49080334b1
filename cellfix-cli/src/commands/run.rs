//! Run command - drive the position provider until interrupted.
//!
//! The command registers itself as a single client, so positioning stays
//! active for as long as it runs. Status and position changes are printed
//! as they arrive. `SIGHUP` reloads the configuration file.

use std::path::PathBuf;

use console::style;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cellfix::provider::{ClientOptions, PositionReport, ProviderHandle, ProviderSignal, Status};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Client name the CLI registers with the provider.
const CLIENT_ID: &str = "cellfix-cli";

/// Arguments for the run command.
pub struct RunArgs {
    pub scan_file: Option<PathBuf>,
    pub interval: Option<u64>,
    pub debug: bool,
}

/// Run the provider until Ctrl-C or idle shutdown.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("run");

    let scan = runner.scan_file(args.scan_file.as_deref())?;
    println!(
        "Reading observations from {}",
        style(scan.path().display()).cyan()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    runtime.block_on(async {
        let (daemon, handle) = runner.create_daemon(scan)?;
        let shutdown = CancellationToken::new();

        let ctrlc_token = shutdown.clone();
        ctrlc::set_handler(move || {
            println!();
            println!("Shutting down...");
            ctrlc_token.cancel();
        })
        .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

        #[cfg(unix)]
        spawn_config_reload(handle.clone(), shutdown.clone())?;

        let mut signals = handle.subscribe();
        let daemon_task = tokio::spawn(daemon.run(shutdown.clone()));

        handle.add_reference(CLIENT_ID)?;
        if let Some(interval) = args.interval {
            handle.set_options(CLIENT_ID, ClientOptions::update_interval(interval))?;
        }

        let (name, description) = handle.get_provider_info();
        println!("{} - {}", style(name).bold(), description);
        println!("Press Ctrl-C to stop.");
        println!();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = signals.recv() => match signal {
                    Ok(ProviderSignal::StatusChanged(status)) => print_status(status),
                    Ok(ProviderSignal::PositionChanged(report)) => {
                        println!("{}", format_position(&report));
                    }
                    Ok(ProviderSignal::IdleShutdown) => {
                        println!("Provider went idle, exiting.");
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed provider signals");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        // The daemon may already be gone after an idle shutdown.
        let _ = handle.remove_reference(CLIENT_ID);
        shutdown.cancel();
        if let Err(e) = daemon_task.await {
            warn!(error = %e, "Provider daemon task failed");
        }

        info!("Run command finished");
        Ok::<(), CliError>(())
    })
}

/// Reload the configuration file whenever the process receives `SIGHUP`.
#[cfg(unix)]
fn spawn_config_reload(handle: ProviderHandle, shutdown: CancellationToken) -> Result<(), CliError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())
        .map_err(|e| CliError::Runtime(format!("Failed to listen for SIGHUP: {}", e)))?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    reload_config(&handle);
                }
            }
        }
    });
    Ok(())
}

#[cfg(unix)]
fn reload_config(handle: &ProviderHandle) {
    match cellfix::config::ConfigFile::load() {
        Ok(config) => {
            info!("Configuration reloaded");
            println!("{}", style("Configuration reloaded").yellow());
            if let Err(e) = handle.change_config(config.positioning_settings()) {
                warn!(error = %e, "Failed to apply reloaded configuration");
            }
        }
        Err(e) => {
            warn!(error = %e, "Keeping previous configuration");
            eprintln!("{} {}", style("Reload failed:").red(), e);
        }
    }
}

fn print_status(status: Status) {
    let label = match status {
        Status::Error => style(status.to_string()).red().bold(),
        Status::Unavailable => style(status.to_string()).dim(),
        Status::Acquiring => style(status.to_string()).yellow(),
        Status::Available => style(status.to_string()).green().bold(),
    };
    println!("Status: {}", label);
}

/// One line describing a reported position.
fn format_position(report: &PositionReport) -> String {
    if report.fields.is_empty() {
        return "Position: (none)".to_string();
    }

    let mut line = format!("Position: {:.6}, {:.6}", report.latitude, report.longitude);
    if report.accuracy.horizontal > 0.0 {
        line.push_str(&format!(" ±{:.0} m", report.accuracy.horizontal));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellfix::cell::Coordinates;
    use cellfix::provider::{Location, LocationSource};

    #[test]
    fn test_format_empty_position() {
        assert_eq!(format_position(&PositionReport::empty()), "Position: (none)");
    }

    #[test]
    fn test_format_position_with_accuracy() {
        let location = Location::new(
            Coordinates::new(59.33, 18.06).with_accuracy(650.0),
            LocationSource::Online,
        );
        let report = PositionReport::from_location(&location);
        assert_eq!(
            format_position(&report),
            "Position: 59.330000, 18.060000 ±650 m"
        );
    }
}
