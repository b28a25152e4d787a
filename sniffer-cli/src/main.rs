mod cli;
mod config;
mod error;
mod logging;

use std::process;

use clap::Parser;
use colored::*;
use sniffer::browser::ChromiumSession;
use sniffer::{CaptureSession, SessionStats};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{cli::Args, config::AppConfig, error::Result, logging::init_logging};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let _guard = init_logging(args.verbose, args.quiet, args.log_dir.as_deref())?;

    let config = AppConfig::load(args.config.as_deref())?.merge_args(&args);
    let sniffer_config = config.sniffer_config()?;
    let manifest_dir = sniffer_config.fetch.manifest_dir.clone();
    let session = CaptureSession::new(sniffer_config)?;

    let browser = ChromiumSession::attach(&config.launch_options()).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupted, shutting down");
                    cancel.cancel();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        }
    });

    println!(
        "{} {}",
        "Listening for manifests, press Ctrl-C to stop. Saving to".green(),
        manifest_dir.display().to_string().cyan()
    );
    let result = session.run(&browser, cancel).await;
    browser.close().await;

    print_summary(&result?);
    Ok(())
}

fn print_summary(stats: &SessionStats) {
    println!("\n{}", "Capture summary:".green().bold());
    println!("  {}: {}", "Events".yellow(), stats.events);
    println!("  {}: {}", "Raw payloads".yellow(), stats.raw_payloads);
    println!("  {}: {}", "Host responses".yellow(), stats.host_responses);
    println!("  {}: {}", "Manifest links".yellow(), stats.candidates);
    println!(
        "  {}: {}",
        "Manifests fetched".yellow(),
        stats.dispatched.to_string().cyan()
    );
}
