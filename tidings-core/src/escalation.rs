//! Escalation of log events to the host application
//!
//! The logger never owns the application. It is handed an
//! [`ApplicationAccessor`] at construction and asks it for the running
//! instance at call time, because loggers are usually created long before
//! the application finishes starting up.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::metrics::LoggingMetrics;
use crate::record::{unix_seconds, CallerLocation};

/// Source and module of this file, skipped by caller resolution
pub(crate) const SOURCE: &str = file!();
pub(crate) const MODULE: &str = module_path!();

/// Length of the metadata hash cargo appends to test binary names
const CARGO_HASH_LEN: usize = 16;

/// User-facing warning raised by a network-level failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationWarning {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub logger_name: String,
    pub caller_location: CallerLocation,
    pub warning_msg: String,
}

impl ApplicationWarning {
    pub fn new(
        logger_name: impl Into<String>,
        caller_location: CallerLocation,
        warning_msg: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: unix_seconds(SystemTime::now()),
            logger_name: logger_name.into(),
            caller_location,
            warning_msg: warning_msg.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.caller_location.file
    }

    pub fn line_number(&self) -> u32 {
        self.caller_location.line
    }

    pub fn function_name(&self) -> &str {
        &self.caller_location.function
    }

    pub fn stack_info(&self) -> Option<&str> {
        self.caller_location.stack.as_deref()
    }

    /// Last component of the dotted logger name
    pub fn module_name(&self) -> &str {
        self.logger_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.logger_name)
    }
}

/// The running application, as seen by the logger
pub trait HostApplication: Send + Sync {
    fn add_application_warning(&self, warning: ApplicationWarning);
    fn notify(&self, text: &str);
}

/// Deferred lookup of the running application
pub trait ApplicationAccessor: Send + Sync {
    fn current(&self) -> Option<Arc<dyn HostApplication>>;
}

impl<F> ApplicationAccessor for F
where
    F: Fn() -> Option<Arc<dyn HostApplication>> + Send + Sync,
{
    fn current(&self) -> Option<Arc<dyn HostApplication>> {
        self()
    }
}

/// Holder for "the main application"
///
/// The application installs itself once it is up; loggers created earlier
/// see it from then on.
#[derive(Default)]
pub struct ApplicationSlot {
    app: RwLock<Option<Arc<dyn HostApplication>>>,
}

impl ApplicationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide slot used when no accessor is injected
    pub fn global() -> &'static ApplicationSlot {
        static GLOBAL: std::sync::OnceLock<ApplicationSlot> = std::sync::OnceLock::new();
        GLOBAL.get_or_init(ApplicationSlot::new)
    }

    /// Install `app`, returning the previously installed one
    pub fn install(&self, app: Arc<dyn HostApplication>) -> Option<Arc<dyn HostApplication>> {
        self.app.write().replace(app)
    }

    pub fn clear(&self) -> Option<Arc<dyn HostApplication>> {
        self.app.write().take()
    }
}

impl ApplicationAccessor for ApplicationSlot {
    fn current(&self) -> Option<Arc<dyn HostApplication>> {
        self.app.read().clone()
    }
}

/// Whether escalation is suppressed because we run under a test harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestMode {
    /// Inspect the executable path on every call
    #[default]
    Detect,
    /// Fixed answer, for tests and embedders that know better
    Forced(bool),
}

impl TestMode {
    pub fn is_active(&self) -> bool {
        match self {
            TestMode::Detect => args_indicate_test_runner(std::env::args()),
            TestMode::Forced(active) => *active,
        }
    }
}

/// Whether `args[0]` is a cargo test binary; nothing is cached
///
/// Only the executable path is inspected, never the remaining arguments.
pub fn args_indicate_test_runner<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .next()
        .is_some_and(|argv0| is_cargo_test_binary(Path::new(argv0.as_ref())))
}

/// `<target-dir>/<profile>/deps/<name>-<16 hex digits>[.exe]`
fn is_cargo_test_binary(path: &Path) -> bool {
    let in_deps = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "deps");
    let hashed = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.rsplit_once('-'))
        .is_some_and(|(name, hash)| {
            !name.is_empty()
                && hash.len() == CARGO_HASH_LEN
                && hash.chars().all(|c| c.is_ascii_hexdigit())
        });
    in_deps && hashed
}

/// Hands warnings and notifications to the host application
///
/// Callers check [`TestMode`] first; the escalator itself always delivers.
#[derive(Clone)]
pub struct WarningEscalator {
    accessor: Arc<dyn ApplicationAccessor>,
    metrics: Arc<LoggingMetrics>,
}

impl WarningEscalator {
    pub fn new(accessor: Arc<dyn ApplicationAccessor>, metrics: Arc<LoggingMetrics>) -> Self {
        Self { accessor, metrics }
    }

    pub fn escalate(&self, warning: ApplicationWarning) {
        match self.accessor.current() {
            Some(app) => {
                app.add_application_warning(warning);
                self.metrics.escalations_total.with_label_values(&["warning"]).inc();
            }
            None => {
                self.metrics
                    .escalations_missed_total
                    .with_label_values(&["warning"])
                    .inc();
                error!(
                    logger = %warning.logger_name,
                    caller = %warning.caller_location,
                    "no running application to receive warning: {}",
                    warning.warning_msg
                );
            }
        }
    }

    pub fn notify(&self, text: &str) {
        match self.accessor.current() {
            Some(app) => {
                app.notify(text);
                self.metrics.escalations_total.with_label_values(&["notify"]).inc();
            }
            None => {
                self.metrics
                    .escalations_missed_total
                    .with_label_values(&["notify"])
                    .inc();
                error!("no running application to receive notification: {}", text);
            }
        }
    }
}
