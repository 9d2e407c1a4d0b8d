use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::caller::CallerLocator;
use crate::errors::TransportError;
use crate::escalation::{ApplicationWarning, HostApplication};
use crate::levels::Level;
use crate::record::{CallerLocation, LogRecord};
use crate::sink::Sink;
use crate::transport::Transport;

/// Sink that stores records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
    threshold: Level,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: Level) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            threshold,
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message().to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Sink for MemorySink {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }

    fn threshold(&self) -> Level {
        self.threshold
    }
}

/// Host application that remembers what it was given
#[derive(Default)]
pub struct RecordingApp {
    warnings: Mutex<Vec<ApplicationWarning>>,
    notifications: Mutex<Vec<String>>,
}

impl RecordingApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<ApplicationWarning> {
        self.warnings.lock().clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().clone()
    }
}

impl HostApplication for RecordingApp {
    fn add_application_warning(&self, warning: ApplicationWarning) {
        self.warnings.lock().push(warning);
    }

    fn notify(&self, text: &str) {
        self.notifications.lock().push(text.to_string());
    }
}

/// Host application that must never be reached
#[derive(Debug, Default, Clone, Copy)]
pub struct PanickingApp;

impl HostApplication for PanickingApp {
    fn add_application_warning(&self, warning: ApplicationWarning) {
        panic!("application warning escalated unexpectedly: {}", warning.warning_msg);
    }

    fn notify(&self, text: &str) {
        panic!("notification escalated unexpectedly: {text}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every publish returns an error
    Error,
    /// First publish panics, later ones succeed
    PanicOnce,
    /// Publishes block until [`FailingTransport::release`], then succeed
    Block,
}

/// Transport misbehaving in a controlled way
pub struct FailingTransport {
    kind: FailureKind,
    attempts: AtomicU64,
    panicked: AtomicBool,
    released: Mutex<bool>,
    released_cv: Condvar,
}

impl FailingTransport {
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            attempts: AtomicU64::new(0),
            panicked: AtomicBool::new(false),
            released: Mutex::new(false),
            released_cv: Condvar::new(),
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` publish attempts were made
    pub fn wait_for_attempts(&self, n: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.attempts() < n {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Unblock every pending and future publish
    pub fn release(&self) {
        *self.released.lock() = true;
        self.released_cv.notify_all();
    }
}

impl Transport for FailingTransport {
    fn publish(&self, topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.kind {
            FailureKind::Error => Err(TransportError::Rejected {
                topic: topic.to_string(),
                reason: "broker unavailable".to_string(),
            }),
            FailureKind::PanicOnce => {
                if !self.panicked.swap(true, Ordering::SeqCst) {
                    panic!("transport exploded");
                }
                Ok(())
            }
            FailureKind::Block => {
                let mut released = self.released.lock();
                while !*released {
                    self.released_cv.wait(&mut released);
                }
                Ok(())
            }
        }
    }
}

/// Locator returning a fixed location
#[derive(Debug, Clone)]
pub struct FixedLocator {
    location: CallerLocation,
}

impl FixedLocator {
    pub fn new(location: CallerLocation) -> Self {
        Self { location }
    }
}

impl CallerLocator for FixedLocator {
    fn locate(&self, capture_stack: bool) -> CallerLocation {
        let mut location = self.location.clone();
        if capture_stack && location.stack.is_none() {
            location.stack = Some(format!("Stack (most recent call last):\n  {location}"));
        }
        location
    }
}
