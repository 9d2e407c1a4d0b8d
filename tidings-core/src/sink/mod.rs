//! Record sinks
//!
//! A sink receives every record that passed the logger's threshold and
//! applies its own threshold on top. Sinks must not fail: whatever goes wrong
//! inside `emit` stays inside `emit`.

pub mod remote;
pub mod tracing_sink;

pub use remote::{RemoteMessage, RemoteSink, RemoteSinkConfig, RemoteSinkStats, DEFAULT_TOPIC_TEMPLATE};
pub use tracing_sink::TracingSink;

use crate::levels::Level;
use crate::record::LogRecord;

pub trait Sink: Send + Sync {
    /// Deliver a record; never panics or returns errors into the logger
    fn emit(&self, record: &LogRecord);

    /// Records below this level are not handed to `emit`
    fn threshold(&self) -> Level {
        Level::NOTSET
    }

    /// Whether this sink wants `record`
    fn accepts(&self, record: &LogRecord) -> bool {
        record.level() >= self.threshold()
    }
}
