//! Lookup command - resolve the current scan online once.
//!
//! Bypasses the provider: no cache, no timers, just one request through the
//! online locator with a spinner while it is in flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

use cellfix::locator::{NetworkReply, OnlineFix, OnlineLocator, ReplySink};
use cellfix::sources::{AccessPointSource, CellSource};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the lookup command.
pub struct LookupArgs {
    pub scan_file: Option<PathBuf>,
    pub debug: bool,
}

/// Hands the single reply back to the waiting command.
struct LookupSink(mpsc::UnboundedSender<NetworkReply>);

impl ReplySink for LookupSink {
    fn deliver(&self, reply: NetworkReply) {
        let _ = self.0.send(reply);
    }
}

/// Run a one-shot lookup.
pub fn run(args: LookupArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("lookup");

    let settings = runner.config().positioning_settings();
    if !settings.online_possible() {
        return Err(CliError::Config(
            "online lookups need online.enabled, permission to send cell or WLAN data, \
             and online.api_key"
                .to_string(),
        ));
    }

    let scan = Arc::new(runner.scan_file(args.scan_file.as_deref())?);
    let scan_display = scan.path().display().to_string();
    let transport = runner.create_transport()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    runtime.block_on(async {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut locator = OnlineLocator::new(
            transport,
            Arc::clone(&scan) as Arc<dyn AccessPointSource>,
            Arc::new(LookupSink(tx)),
            runner.config().locator_config(),
            &settings,
        );

        let now = Instant::now();
        let cells = scan.visible_cells();
        let home_network = scan.home_network();
        let query = locator.build_query(&cells, home_network.as_ref(), None, now);
        if !locator.find_location(&query, now) {
            return Err(CliError::EmptyScan(scan_display));
        }

        let spinner = create_spinner();
        spinner.set_message(format!(
            "Looking up {} cells and {} access points...",
            query.request().cell_towers.len(),
            query.request().wifi_access_points.len()
        ));

        let reply = rx.recv().await;
        spinner.finish_and_clear();

        let reply = reply
            .ok_or_else(|| CliError::Runtime("Lookup ended without a reply".to_string()))?;
        let outcome = locator
            .finish(reply, Instant::now())
            .ok_or_else(|| CliError::Runtime("Lookup reply did not match the request".to_string()))?;
        let fix = outcome.result?;

        info!(
            latitude = fix.coordinates.latitude,
            longitude = fix.coordinates.longitude,
            "Lookup complete"
        );
        print_fix(&fix);
        Ok::<(), CliError>(())
    })
}

/// Spinner on a terminal, a hidden bar when output is redirected.
fn create_spinner() -> ProgressBar {
    if !atty::is(atty::Stream::Stdout) {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_fix(fix: &OnlineFix) {
    println!("{} {}", style("✓").green(), style("Location found").bold());
    for line in describe_fix(fix) {
        println!("  {}", line);
    }
}

fn describe_fix(fix: &OnlineFix) -> Vec<String> {
    let coordinates = &fix.coordinates;
    let mut lines = vec![
        format!("Latitude:  {:.6}", coordinates.latitude),
        format!("Longitude: {:.6}", coordinates.longitude),
    ];
    if let Some(accuracy) = coordinates.accuracy {
        lines.push(format!("Accuracy:  {:.0} m", accuracy));
    }
    if let Some(fallback) = &fix.fallback {
        lines.push(format!("Fallback:  {}", fallback));
    }
    lines
}
