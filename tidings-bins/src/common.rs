//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and setup code.

use anyhow::{Context, Result};
use clap::Parser;
use tidings_core::config::LoggingConfig;
use tidings_core::sink::RemoteSinkStats;
use tidings_core::utils::init_tracing;

/// Common CLI arguments for all binaries
///
/// Flags override the `TIDINGS_*` environment.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Root threshold for structured loggers (name or rank)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// `tracing` filter directive for console output
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Emit console output as JSON
    #[arg(long)]
    pub json: bool,

    /// Ship records to the remote topic
    #[arg(long)]
    pub remote: bool,

    /// Installation id used in the default topic
    #[arg(long)]
    pub uid: Option<String>,

    /// Explicit remote topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Run as a real application even under a test harness
    #[arg(long)]
    pub production: bool,
}

impl CommonArgs {
    /// Environment configuration with command-line overrides applied
    pub fn logging_config(&self) -> Result<LoggingConfig> {
        let mut config = LoggingConfig::from_env();

        if let Some(level) = &self.log_level {
            config.root_level = level.clone();
        }
        if let Some(filter) = &self.filter {
            config.tracing.filter = filter.clone();
        }
        config.tracing.json |= self.json;
        config.remote.enabled |= self.remote;
        if self.uid.is_some() {
            config.remote.sink.uid = self.uid.clone();
        }
        if self.topic.is_some() {
            config.remote.sink.topic = self.topic.clone();
        }

        config.validate().context("invalid logging configuration")?;
        Ok(config)
    }
}

/// Initialize tracing/logging
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    init_tracing(&config.tracing).context("failed to install tracing subscriber")?;
    Ok(())
}

/// Print remote sink counters
pub fn print_stats(stats: &RemoteSinkStats) {
    tracing::info!("=== Remote Sink Statistics ===");
    tracing::info!("Queued: {}", stats.queued);
    tracing::info!("Published: {}", stats.published);
    tracing::info!("Failed: {}", stats.failed);
    tracing::info!("Dropped: {}", stats.dropped);

    if stats.queued > 0 {
        let delivery_rate = (stats.published as f64 / stats.queued as f64) * 100.0;
        tracing::info!("Delivery rate: {:.2}%", delivery_rate);
    }
}
