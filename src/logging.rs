//! Log routing for the service and CLI.
//!
//! Records go to stderr, and additionally to a file when one is configured.
//! Stdout stays free for the `extract` command's JSON output.

use anyhow::{Context, Result};
use log::LevelFilter;

use crate::config::ServiceConfig;

/// Install the global logger. Fails if a logger is already installed.
pub fn init_logging(config: &ServiceConfig) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {:<5} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(config.log_level)
        .level_for("hyper", config.log_level.min(LevelFilter::Warn))
        .level_for("h2", config.log_level.min(LevelFilter::Warn))
        .chain(std::io::stderr());

    if let Some(path) = &config.log_file {
        let file = fern::log_file(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().context("Logger already initialized")?;
    Ok(())
}
