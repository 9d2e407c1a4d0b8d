//! Tidings Core - structured logging with remote shipping and escalation
//!
//! Named loggers in a dotted hierarchy, two extra severities (NOTIFY and
//! NETWORK) between INFO and WARNING, and optional delivery of every record
//! to a pub/sub topic.
//!
//! ## Architecture
//! - **Non-blocking** remote emission: records are queued, a worker publishes
//! - **Failure isolation**: transport errors and panics never reach the caller
//! - **Deferred application lookup**: loggers exist before the app does
//! - **Caller resolution** skips the logging stack's own frames
//!
//! ## Core Modules
//! - `levels`: Level ranks and the process-wide registry
//! - `record`: Log records and caller locations
//! - `caller`: Backtrace-based caller resolution
//! - `logger`: `LogManager` and `StructuredLogger`
//! - `sink`: Sink trait, tracing bridge, remote sink
//! - `transport`: Publish seam and the in-process `LocalBus`
//! - `escalation`: Host application hand-off for NOTIFY and NETWORK
//! - `config`: Environment-driven configuration

pub mod caller;
pub mod config;
pub mod errors;
pub mod escalation;
pub mod format;
pub mod levels;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod sink;
pub mod transport;
pub mod utils;

// Test doubles, also used by downstream integration tests
pub mod testing;

pub use caller::{BacktraceLocator, CallerLocator, CORE_MODULES, CORE_SOURCES};
pub use config::LoggingConfig;
pub use errors::{LevelError, LoggingError, TransportError};
pub use escalation::{
    ApplicationAccessor, ApplicationSlot, ApplicationWarning, HostApplication, TestMode,
    WarningEscalator,
};
pub use levels::{Level, LevelRegistry};
pub use logger::{LogManager, LogManagerBuilder, StructuredLogger};
pub use metrics::LoggingMetrics;
pub use record::{CallerLocation, LogRecord};
pub use sink::{RemoteMessage, RemoteSink, RemoteSinkConfig, Sink, TracingSink};
pub use transport::{LocalBus, Transport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::escalation::{ApplicationSlot, ApplicationWarning, HostApplication, TestMode};
    pub use crate::levels::Level;
    pub use crate::logger::{LogManager, StructuredLogger};
    pub use crate::sink::Sink;
    pub use crate::transport::{LocalBus, Transport};
    pub use crate::LoggingError;
}
