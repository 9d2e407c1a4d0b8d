//! Forwards records into `tracing`
//!
//! Bridges the numeric level scale onto tracing's five levels so records
//! show up in whatever subscriber the process installed (see
//! [`crate::utils::init_tracing`]). NOTIFY and NETWORK map to INFO; the
//! original level name is kept as a field.

use tracing::{debug, error, info, trace, warn};

use crate::levels::Level;
use crate::record::LogRecord;
use crate::sink::Sink;

#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    threshold: Level,
}

impl TracingSink {
    pub fn new() -> Self {
        Self {
            threshold: Level::NOTSET,
        }
    }

    pub fn with_threshold(threshold: Level) -> Self {
        Self { threshold }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let logger = record.logger_name();
        let level = record.level_name();
        let caller = record.caller();
        let msg = record.message();

        if record.level() >= Level::ERROR {
            error!(logger, level, file = %caller.file, line = caller.line, "{}", msg);
        } else if record.level() >= Level::WARNING {
            warn!(logger, level, file = %caller.file, line = caller.line, "{}", msg);
        } else if record.level() >= Level::INFO {
            info!(logger, level, file = %caller.file, line = caller.line, "{}", msg);
        } else if record.level() >= Level::DEBUG {
            debug!(logger, level, file = %caller.file, line = caller.line, "{}", msg);
        } else {
            trace!(logger, level, file = %caller.file, line = caller.line, "{}", msg);
        }
    }

    fn threshold(&self) -> Level {
        self.threshold
    }
}
