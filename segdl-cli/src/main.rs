mod cli;
mod error;
mod output;

use std::process;
use std::time::Duration;

use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::validator::Validation;
use inquire::{Confirm, CustomType, CustomUserError};
use playlist::{
    DEFAULT_WORKERS, ManifestEntry, PlaylistError, SegmentDownloader, list_manifests,
    rewrite_file, segment_urls, segments_dir,
};
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::Args,
    error::{AppError, Result},
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose, args.quiet) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        if !e.is_input_error() {
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let entries = match list_manifests(&args.manifest_dir) {
        Ok(entries) => entries,
        Err(e @ PlaylistError::MissingDirectory { .. }) => {
            println!("{}", e.to_string().yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if entries.is_empty() {
        println!(
            "{} {}",
            "No manifests found in".yellow(),
            args.manifest_dir.display()
        );
        return Ok(());
    }

    println!("{}", output::manifest_table(&entries));
    let entry = select_manifest(&entries)?;
    println!("{} {}", "Selected:".green(), entry.name.cyan());

    let fetch_segments = Confirm::new("Download video segments?")
        .with_default(true)
        .prompt()?;

    let rewritten = rewrite_file(&entry.path, &args.output_dir, &args.prefix).await?;
    println!(
        "{} {}",
        "Rewritten manifest saved to".green(),
        rewritten.path.display()
    );

    if !fetch_segments {
        println!("Skipped segment download; only the rewritten manifest was written");
        return Ok(());
    }

    let urls = segment_urls(&rewritten.content);
    if urls.is_empty() {
        println!("{}", "No segment URLs found in the manifest".yellow());
        return Ok(());
    }

    let workers = CustomType::<usize>::new("Number of download workers:")
        .with_default(DEFAULT_WORKERS)
        .with_error_message("Please type a whole number")
        .with_validator(at_least_one)
        .prompt()?;

    let downloader = SegmentDownloader::new(workers, Duration::from_secs(args.timeout))?;
    let dir = segments_dir(&args.output_dir, &entry.name);
    println!(
        "Found {} segments, downloading into {}",
        urls.len(),
        dir.display()
    );

    let bar = ProgressBar::new(urls.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len}") {
        bar.set_style(style);
    }
    let reporter = bar.clone();
    let summary = downloader
        .download_all(&urls, &dir, move |progress| {
            reporter.set_position(progress.done as u64);
            reporter.println(progress.to_string());
        })
        .await?;
    bar.finish_and_clear();

    println!("{}", output::summary_line(&summary));
    Ok(())
}

fn select_manifest(entries: &[ManifestEntry]) -> Result<&ManifestEntry> {
    let index = CustomType::<usize>::new("Select a manifest by number:")
        .with_error_message("Please type a valid number")
        .prompt()?;
    match index.checked_sub(1).and_then(|i| entries.get(i)) {
        Some(entry) => Ok(entry),
        None => Err(AppError::InvalidSelection {
            index,
            count: entries.len(),
        }),
    }
}

fn at_least_one(workers: &usize) -> std::result::Result<Validation, CustomUserError> {
    if *workers >= 1 {
        Ok(Validation::Valid)
    } else {
        Ok(Validation::Invalid("At least one worker is required".into()))
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
