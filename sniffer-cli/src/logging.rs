use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::error::{AppError, Result};

const LOG_FILE_PREFIX: &str = "sniffer.log";

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    }
}

/// Console logging, plus a daily-rolling file when `log_dir` is set.
///
/// The returned guard flushes the file writer; keep it alive until exit.
pub fn init_logging(
    verbose: bool,
    quiet: bool,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry()
        .with(filter(verbose, quiet))
        .with(fmt::layer().with_target(verbose));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .map_err(|e| AppError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| AppError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}
