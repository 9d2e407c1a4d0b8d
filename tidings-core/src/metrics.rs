//! Prometheus metrics for the logging stack
//!
//! Tracks:
//! - Records emitted per level
//! - Remote sink outcomes (published, failed, dropped)
//! - Escalations to the host application, and escalations with no
//!   application to receive them

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Logging counters registered in their own Prometheus registry
#[derive(Clone)]
pub struct LoggingMetrics {
    registry: Arc<Registry>,
    /// Records that passed the logger threshold, by level name
    pub records_total: IntCounterVec,
    /// Messages handed to the transport successfully
    pub remote_published_total: IntCounter,
    /// Transport errors and panics during publish
    pub remote_failed_total: IntCounter,
    /// Messages discarded because the queue was full or closed
    pub remote_dropped_total: IntCounter,
    /// Escalations delivered, by kind ("warning" / "notify")
    pub escalations_total: IntCounterVec,
    /// Escalations with no running application to receive them
    pub escalations_missed_total: IntCounterVec,
}

impl LoggingMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let records_total = IntCounterVec::new(
            Opts::new("log_records_total", "Total number of log records emitted")
                .namespace("tidings"),
            &["level"],
        )?;
        registry.register(Box::new(records_total.clone()))?;

        let remote_published_total = IntCounter::with_opts(
            Opts::new(
                "remote_published_total",
                "Total number of records published to the remote transport",
            )
            .namespace("tidings"),
        )?;
        registry.register(Box::new(remote_published_total.clone()))?;

        let remote_failed_total = IntCounter::with_opts(
            Opts::new(
                "remote_failed_total",
                "Total number of remote publish attempts that failed",
            )
            .namespace("tidings"),
        )?;
        registry.register(Box::new(remote_failed_total.clone()))?;

        let remote_dropped_total = IntCounter::with_opts(
            Opts::new(
                "remote_dropped_total",
                "Total number of records dropped before reaching the transport",
            )
            .namespace("tidings"),
        )?;
        registry.register(Box::new(remote_dropped_total.clone()))?;

        let escalations_total = IntCounterVec::new(
            Opts::new(
                "escalations_total",
                "Total number of escalations handed to the host application",
            )
            .namespace("tidings"),
            &["kind"],
        )?;
        registry.register(Box::new(escalations_total.clone()))?;

        let escalations_missed_total = IntCounterVec::new(
            Opts::new(
                "escalations_missed_total",
                "Total number of escalations with no host application running",
            )
            .namespace("tidings"),
            &["kind"],
        )?;
        registry.register(Box::new(escalations_missed_total.clone()))?;

        Ok(Self {
            registry,
            records_total,
            remote_published_total,
            remote_failed_total,
            remote_dropped_total,
            escalations_total,
            escalations_missed_total,
        })
    }

    /// Get the underlying Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_emitted(&self, level_name: &str) {
        self.records_total.with_label_values(&[level_name]).inc();
    }
}

impl Default for LoggingMetrics {
    #[allow(clippy::panic)] // Fixed metric names; registration only fails on programmer error
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("FATAL: Failed to create logging metrics: {}", e);
            panic!("Critical: Cannot create logging metrics")
        })
    }
}
