//! Error types for the logging core
//!
//! Logging calls themselves never return errors. These types surface only
//! from setup paths (level registration, manager construction, tracing
//! initialization) and from the transport seam, where the remote sink
//! swallows them.

use thiserror::Error;

/// Errors raised by the level registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    /// Name already registered with a different rank
    #[error("level {name} is registered with rank {existing}, refusing rank {requested}")]
    ConflictingRank {
        name: String,
        existing: u32,
        requested: u32,
    },

    /// Rank already carries a different name
    #[error("rank {rank} already belongs to level {existing}, refusing name {requested}")]
    RankTaken {
        rank: u32,
        existing: String,
        requested: String,
    },

    /// Empty or whitespace-only level name
    #[error("level name must not be empty")]
    EmptyName,

    /// Lookup of a name that was never registered
    #[error("unknown level name '{0}'")]
    Unknown(String),

    /// Process registry was already installed with an incompatible set
    #[error("level registry already initialized; {0} cannot be added afterwards")]
    AlreadyInitialized(String),
}

/// Errors reported by a publish-subscribe transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The destination refused the message
    #[error("publish to '{topic}' rejected: {reason}")]
    Rejected { topic: String, reason: String },

    /// Wire serialization failed
    #[error("failed to serialize remote message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Underlying I/O failure
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while assembling the logging stack
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Remote shipping enabled but nothing to ship through
    #[error("remote logging is enabled but no transport was provided")]
    MissingTransport,

    /// Configuration value out of range or unparsable
    #[error("invalid logging configuration: {0}")]
    InvalidConfig(String),

    /// Level registry failure
    #[error(transparent)]
    Level(#[from] LevelError),

    /// Remote sink could not be started
    #[error("failed to start remote sink: {0}")]
    Transport(#[from] TransportError),

    /// Prometheus registration failure
    #[error("failed to register logging metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Tracing subscriber could not be installed
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}
