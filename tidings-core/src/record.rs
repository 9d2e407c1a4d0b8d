//! Log records and caller locations

use std::fmt;
use std::panic::Location;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::levels::Level;

pub const UNKNOWN_FILE: &str = "(unknown file)";
pub const UNKNOWN_FUNCTION: &str = "(unknown function)";

/// Source position of the code that issued a log call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
    /// Rendered stack snapshot, only when explicitly requested
    pub stack: Option<String>,
}

impl CallerLocation {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
            stack: None,
        }
    }

    /// Returned when no frame outside the logging core can be found
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_FILE, 0, UNKNOWN_FUNCTION)
    }

    pub fn is_unknown(&self) -> bool {
        self.file == UNKNOWN_FILE && self.line == 0
    }

    /// From a `#[track_caller]` location; the function name is not available there
    pub fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), UNKNOWN_FUNCTION)
    }

    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }
}

impl Default for CallerLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CallerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in {}", self.file, self.line, self.function)
    }
}

/// A single log event, immutable once built
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: SystemTime,
    level: Level,
    level_name: String,
    message: String,
    logger_name: String,
    caller: CallerLocation,
}

impl LogRecord {
    pub fn new(
        level: Level,
        message: impl Into<String>,
        logger_name: impl Into<String>,
        caller: CallerLocation,
    ) -> Self {
        Self {
            timestamp: SystemTime::now(),
            level,
            level_name: level.name(),
            message: message.into(),
            logger_name: logger_name.into(),
            caller,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Seconds since the Unix epoch
    pub fn created(&self) -> f64 {
        unix_seconds(self.timestamp)
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn level_no(&self) -> u32 {
        self.level.rank()
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn caller(&self) -> &CallerLocation {
        &self.caller
    }
}

pub(crate) fn unix_seconds(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_location() {
        let loc = CallerLocation::unknown();
        assert_eq!(loc.file, "(unknown file)");
        assert_eq!(loc.line, 0);
        assert_eq!(loc.function, "(unknown function)");
        assert!(loc.stack.is_none());
        assert!(loc.is_unknown());
    }

    #[test]
    fn test_from_track_caller_location() {
        let loc = CallerLocation::from_location(Location::caller());
        assert!(loc.file.ends_with("record.rs"));
        assert!(loc.line > 0);
        assert!(!loc.is_unknown());
    }

    #[test]
    fn test_record_fields() {
        let record = LogRecord::new(Level::INFO, "hello", "x.y", CallerLocation::unknown());
        assert_eq!(record.message(), "hello");
        assert_eq!(record.level_no(), 20);
        assert_eq!(record.level_name(), "INFO");
        assert_eq!(record.logger_name(), "x.y");
        assert!(record.created() > 0.0);
    }
}
