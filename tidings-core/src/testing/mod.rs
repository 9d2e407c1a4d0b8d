//! Test doubles for the logging stack
//!
//! - [`MemorySink`]: keeps every record it receives
//! - [`RecordingApp`] / [`PanickingApp`]: host applications that record or
//!   refuse escalations
//! - [`FailingTransport`]: transport that errors, panics or blocks on demand
//! - [`FixedLocator`]: caller locator with a canned answer

pub mod doubles;

pub use doubles::{
    FailingTransport, FailureKind, FixedLocator, MemorySink, PanickingApp, RecordingApp,
};
