//! Record formatting

use chrono::{DateTime, Local};

use crate::record::LogRecord;

/// Renders a record into a single line of text
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

/// Message text only (the default for sinks)
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFormatter;

impl Formatter for MessageFormatter {
    fn format(&self, record: &LogRecord) -> String {
        record.message().to_string()
    }
}

/// `2024-01-01 12:00:00,123 - 4242 - a.b - WARNING - text`
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormatter;

impl Formatter for LineFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let at: DateTime<Local> = record.timestamp().into();
        format!(
            "{} - {} - {} - {} - {}",
            at.format("%Y-%m-%d %H:%M:%S,%3f"),
            std::process::id(),
            record.logger_name(),
            record.level_name(),
            record.message()
        )
    }
}
