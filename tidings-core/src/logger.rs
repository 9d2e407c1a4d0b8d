//! Structured, hierarchical logger with escalation
//!
//! Loggers are named with dotted paths (`connector.exchange.feed`) and are
//! handed out by a [`LogManager`]. A record is built only when its level
//! meets the logger's effective threshold, then goes to
//! - the logger's own sinks (including the remote sink, attached when the
//!   logger is created if remote shipping is enabled),
//! - the manager's root sinks.
//!
//! `notify` and `network` additionally escalate to the host application
//! unless the process runs under a test harness.

use std::any::type_name;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;

use crate::caller::{BacktraceLocator, CallerLocator};
use crate::config::LoggingConfig;
use crate::errors::LoggingError;
use crate::escalation::{
    ApplicationAccessor, ApplicationSlot, ApplicationWarning, HostApplication, TestMode,
    WarningEscalator,
};
use crate::format::Formatter;
use crate::levels::{self, Level};
use crate::metrics::LoggingMetrics;
use crate::record::{CallerLocation, LogRecord};
use crate::sink::{RemoteSink, Sink, TracingSink};
use crate::transport::Transport;

const ROOT_LOGGER: &str = "root";

/// Source and module of this file, skipped by caller resolution
pub(crate) const SOURCE: &str = file!();
pub(crate) const MODULE: &str = module_path!();

/// Logger name for a type: `my_app::feed::Feed<T>` becomes `my_app.feed.Feed`
pub fn logger_name_for<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.replace("::", ".")
}

/// Resolves to whatever is installed in [`ApplicationSlot::global`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MainApplication;

impl ApplicationAccessor for MainApplication {
    fn current(&self) -> Option<Arc<dyn HostApplication>> {
        ApplicationSlot::global().current()
    }
}

/// State shared by every logger of one manager
struct LoggerContext {
    root_level: AtomicU32,
    subtree_levels: DashMap<String, Level>,
    root_sinks: RwLock<Vec<Arc<dyn Sink>>>,
    remote: Option<Arc<RemoteSink>>,
    escalator: WarningEscalator,
    test_mode: TestMode,
    locator: Arc<dyn CallerLocator>,
    capture_stack: bool,
    metrics: Arc<LoggingMetrics>,
}

impl LoggerContext {
    /// Nearest configured ancestor threshold, else the root level
    fn inherited_level(&self, name: &str) -> Level {
        let mut current = name;
        loop {
            if let Some(level) = self.subtree_levels.get(current) {
                if *level != Level::NOTSET {
                    return *level;
                }
            }
            match current.rfind('.') {
                Some(idx) => current = &current[..idx],
                None => break,
            }
        }
        Level::new(self.root_level.load(Ordering::Relaxed))
    }
}

pub struct StructuredLogger {
    name: String,
    level: AtomicU32,
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
    remote_attached: bool,
    context: Arc<LoggerContext>,
}

impl StructuredLogger {
    fn new(name: &str, context: Arc<LoggerContext>) -> Self {
        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
        let remote_attached = match &context.remote {
            Some(remote) => {
                sinks.push(remote.clone());
                true
            }
            None => false,
        };

        Self {
            name: name.to_string(),
            level: AtomicU32::new(Level::NOTSET.rank()),
            sinks: RwLock::new(sinks),
            remote_attached,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own level; `NOTSET` means inherited
    pub fn level(&self) -> Level {
        Level::new(self.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level.rank(), Ordering::Relaxed);
    }

    pub fn effective_level(&self) -> Level {
        let own = self.level();
        if own != Level::NOTSET {
            return own;
        }
        self.context.inherited_level(&self.name)
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.effective_level()
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.sinks.write().push(sink);
    }

    pub fn has_remote_sink(&self) -> bool {
        self.remote_attached
    }

    /// Emit `message` at `level` if the threshold allows it
    #[track_caller]
    pub fn log_at(&self, level: Level, message: impl fmt::Display) {
        if !self.is_enabled_for(level) {
            return;
        }
        let caller = CallerLocation::from_location(Location::caller());
        self.dispatch(LogRecord::new(level, message.to_string(), self.name.as_str(), caller));
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log_at(Level::DEBUG, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log_at(Level::INFO, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) {
        self.log_at(Level::WARNING, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log_at(Level::ERROR, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl fmt::Display) {
        self.log_at(Level::CRITICAL, message);
    }

    /// Log at NOTIFY and show the message in the running application
    #[track_caller]
    pub fn notify(&self, message: &str) {
        self.log_at(Level::NOTIFY, message);
        if self.context.test_mode.is_active() {
            return;
        }
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.context.escalator.notify(&format!("({now}) {message}"));
    }

    /// Log at NETWORK; with `app_warning`, raise an application warning
    /// pointing at the caller
    ///
    /// The warning is raised even when NETWORK itself is filtered out.
    #[track_caller]
    pub fn network(&self, message: impl fmt::Display, app_warning: Option<&str>) {
        self.log_at(Level::NETWORK, message);

        let Some(text) = app_warning else {
            return;
        };
        if self.context.test_mode.is_active() {
            return;
        }

        let caller = self.context.locator.locate(self.context.capture_stack);
        let warning = ApplicationWarning::new(self.name.as_str(), caller, text);
        self.warning(&warning.warning_msg);
        self.context.escalator.escalate(warning);
    }

    fn dispatch(&self, record: LogRecord) {
        self.context.metrics.record_emitted(record.level_name());

        // read_recursive: a sink may itself log through this logger
        for sink in self.sinks.read_recursive().iter() {
            if sink.accepts(&record) {
                sink.emit(&record);
            }
        }
        for sink in self.context.root_sinks.read_recursive().iter() {
            if sink.accepts(&record) {
                sink.emit(&record);
            }
        }
    }
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("remote_attached", &self.remote_attached)
            .finish()
    }
}

/// Hands out named loggers sharing one configuration
pub struct LogManager {
    context: Arc<LoggerContext>,
    loggers: DashMap<String, Arc<StructuredLogger>>,
}

impl LogManager {
    pub fn builder() -> LogManagerBuilder {
        LogManagerBuilder::new()
    }

    /// Logger for `name`; the same name always yields the same logger
    pub fn get_logger(&self, name: &str) -> Arc<StructuredLogger> {
        let name = match name.trim() {
            "" => ROOT_LOGGER,
            trimmed => trimmed,
        };
        self.loggers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(StructuredLogger::new(name, Arc::clone(&self.context))))
            .value()
            .clone()
    }

    /// Logger named after `T`'s path
    pub fn logger_for<T: ?Sized>(&self) -> Arc<StructuredLogger> {
        self.get_logger(&logger_name_for::<T>())
    }

    /// Threshold for `prefix` and every logger below it
    pub fn set_level(&self, prefix: &str, level: Level) {
        self.context.subtree_levels.insert(prefix.to_string(), level);
    }

    pub fn clear_level(&self, prefix: &str) {
        self.context.subtree_levels.remove(prefix);
    }

    pub fn root_level(&self) -> Level {
        Level::new(self.context.root_level.load(Ordering::Relaxed))
    }

    pub fn set_root_level(&self, level: Level) {
        self.context.root_level.store(level.rank(), Ordering::Relaxed);
    }

    /// Sink receiving records from every logger
    pub fn add_root_sink(&self, sink: Arc<dyn Sink>) {
        self.context.root_sinks.write().push(sink);
    }

    pub fn remote_sink(&self) -> Option<&Arc<RemoteSink>> {
        self.context.remote.as_ref()
    }

    pub fn metrics(&self) -> &Arc<LoggingMetrics> {
        &self.context.metrics
    }

    pub fn logger_count(&self) -> usize {
        self.loggers.len()
    }

    /// Flush and close the remote sink, if any
    pub fn shutdown(&self, timeout: Duration) -> bool {
        match &self.context.remote {
            Some(remote) => remote.close(timeout),
            None => true,
        }
    }
}

pub struct LogManagerBuilder {
    config: LoggingConfig,
    transport: Option<Arc<dyn Transport>>,
    accessor: Option<Arc<dyn ApplicationAccessor>>,
    test_mode: TestMode,
    locator: Option<Arc<dyn CallerLocator>>,
    capture_stack: bool,
    root_sinks: Vec<Arc<dyn Sink>>,
    tracing_sink: bool,
    remote_formatter: Option<Box<dyn Formatter>>,
    metrics: Option<Arc<LoggingMetrics>>,
}

impl LogManagerBuilder {
    /// Starts from the process environment
    pub fn new() -> Self {
        Self {
            config: LoggingConfig::from_env(),
            transport: None,
            accessor: None,
            test_mode: TestMode::Detect,
            locator: None,
            capture_stack: false,
            root_sinks: Vec::new(),
            tracing_sink: true,
            remote_formatter: None,
            metrics: None,
        }
    }

    pub fn config(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    /// Transport for the remote sink; required when remote shipping is on
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where to find the running application (default: [`MainApplication`])
    pub fn application(mut self, accessor: Arc<dyn ApplicationAccessor>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn test_mode(mut self, mode: TestMode) -> Self {
        self.test_mode = mode;
        self
    }

    /// Caller lookup for escalations (default: [`BacktraceLocator`])
    pub fn locator(mut self, locator: Arc<dyn CallerLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Attach a stack snapshot to every escalated warning
    pub fn capture_stack(mut self, capture: bool) -> Self {
        self.capture_stack = capture;
        self
    }

    pub fn root_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.root_sinks.push(sink);
        self
    }

    /// Skip the default [`TracingSink`]
    pub fn without_tracing_sink(mut self) -> Self {
        self.tracing_sink = false;
        self
    }

    pub fn remote_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.remote_formatter = Some(formatter);
        self
    }

    pub fn metrics(mut self, metrics: Arc<LoggingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<LogManager, LoggingError> {
        levels::initialize();
        self.config.validate()?;
        let root_level = self.config.root_level()?;

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(LoggingMetrics::new()?),
        };

        let remote = if self.config.remote.enabled {
            let transport = self.transport.ok_or(LoggingError::MissingTransport)?;
            let mut sink = RemoteSink::new(transport, &self.config.remote.sink, Arc::clone(&metrics))?;
            if let Some(formatter) = self.remote_formatter {
                sink = sink.with_formatter(formatter);
            }
            info!(topic = %sink.topic(), "remote log shipping enabled");
            Some(Arc::new(sink))
        } else {
            None
        };

        let mut root_sinks = self.root_sinks;
        if self.tracing_sink {
            root_sinks.insert(0, Arc::new(TracingSink::new()));
        }

        let accessor = self
            .accessor
            .unwrap_or_else(|| Arc::new(MainApplication));
        let locator = self
            .locator
            .unwrap_or_else(|| Arc::new(BacktraceLocator::new()));

        let context = LoggerContext {
            root_level: AtomicU32::new(root_level.rank()),
            subtree_levels: DashMap::new(),
            root_sinks: RwLock::new(root_sinks),
            remote,
            escalator: WarningEscalator::new(accessor, Arc::clone(&metrics)),
            test_mode: self.test_mode,
            locator,
            capture_stack: self.capture_stack,
            metrics,
        };

        Ok(LogManager {
            context: Arc::new(context),
            loggers: DashMap::new(),
        })
    }
}

impl Default for LogManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
