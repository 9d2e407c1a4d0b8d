//! Remote log shipping over a publish-subscribe transport
//!
//! `emit` never blocks and never fails:
//! - the record is rendered and wrapped into a [`RemoteMessage`] on the
//!   caller's thread,
//! - the message goes onto a bounded queue with `try_send` (a full queue
//!   drops it),
//! - a dedicated worker thread serializes to JSON and calls
//!   [`Transport::publish`]; errors and panics are counted and logged
//!   through `tracing`, never propagated.
//!
//! Lifecycle is explicit: [`RemoteSink::flush`] waits for everything queued
//! so far, [`RemoteSink::close`] flushes and joins the worker. Dropping the
//! sink closes it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::errors::TransportError;
use crate::format::{Formatter, MessageFormatter};
use crate::metrics::LoggingMetrics;
use crate::record::{unix_seconds, LogRecord};
use crate::sink::Sink;
use crate::transport::Transport;

/// Topic used when no explicit topic is configured
pub const DEFAULT_TOPIC_TEMPLATE: &str = "tidings/$UID/log";
const UID_PLACEHOLDER: &str = "$UID";
const UNKNOWN_UID: &str = "unknown";

/// Default bound on queued messages
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Wire projection of a log record
///
/// Field names and types are a compatibility contract with downstream
/// consumers. Do not rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub timestamp: f64,
    pub msg: String,
    pub level_no: u32,
    pub level_name: String,
    pub logger_name: String,
}

impl RemoteMessage {
    /// Wrap an already rendered record, stamped with the current wall clock
    pub fn from_record(record: &LogRecord, rendered: String) -> Self {
        Self {
            timestamp: unix_seconds(SystemTime::now()),
            msg: rendered,
            level_no: record.level_no(),
            level_name: record.level_name().to_string(),
            logger_name: record.logger_name().to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Build the default topic for an installation id
pub fn default_topic(uid: Option<&str>) -> String {
    let uid = uid.map(str::trim).filter(|u| !u.is_empty()).unwrap_or(UNKNOWN_UID);
    DEFAULT_TOPIC_TEMPLATE.replace(UID_PLACEHOLDER, uid)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSinkConfig {
    /// Explicit topic; empty or missing means the default template
    pub topic: Option<String>,
    /// Installation identifier substituted into the template
    pub uid: Option<String>,
    pub queue_capacity: usize,
}

impl RemoteSinkConfig {
    pub fn resolved_topic(&self) -> String {
        match self.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic.to_string(),
            _ => default_topic(self.uid.as_deref()),
        }
    }
}

impl Default for RemoteSinkConfig {
    fn default() -> Self {
        Self {
            topic: None,
            uid: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Counters for one sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteSinkStats {
    pub queued: u64,
    pub published: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum Command {
    Publish(RemoteMessage),
    Flush(Sender<()>),
    Stop,
}

pub struct RemoteSink {
    topic: String,
    sender: Sender<Command>,
    formatter: Box<dyn Formatter>,
    counters: Arc<Counters>,
    metrics: Arc<LoggingMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Held for reading across an enqueue, for writing when closing
    closed: RwLock<bool>,
}

impl RemoteSink {
    /// Start the publishing worker for `transport`
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &RemoteSinkConfig,
        metrics: Arc<LoggingMetrics>,
    ) -> Result<Self, TransportError> {
        let topic = config.resolved_topic();
        let (sender, receiver) = channel::bounded(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let worker = {
            let topic = topic.clone();
            let counters = Arc::clone(&counters);
            let metrics = Arc::clone(&metrics);
            thread::Builder::new()
                .name("tidings-remote-sink".to_string())
                .spawn(move || run_worker(receiver, transport, topic, counters, metrics))?
        };

        debug!(topic = %topic, "remote log sink started");

        Ok(Self {
            topic,
            sender,
            formatter: Box::new(MessageFormatter),
            counters,
            metrics,
            worker: Mutex::new(Some(worker)),
            closed: RwLock::new(false),
        })
    }

    pub fn with_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    pub fn stats(&self) -> RemoteSinkStats {
        RemoteSinkStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Wait until every message queued before this call reached the transport
    ///
    /// Returns `false` on timeout or when the sink is already closed.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_closed() {
            return false;
        }
        self.flush_inner(timeout)
    }

    fn flush_inner(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self
            .sender
            .send_deadline(Command::Flush(ack_tx), deadline)
            .is_err()
        {
            return false;
        }
        ack_rx.recv_deadline(deadline).is_ok()
    }

    /// Flush, stop and join the worker
    ///
    /// Idempotent. If the transport does not drain within `timeout` the
    /// worker is left to finish on its own and `false` is returned.
    pub fn close(&self, timeout: Duration) -> bool {
        {
            // Waits for in-flight `emit` calls, so no publish lands after Stop
            let mut closed = self.closed.write();
            if *closed {
                return true;
            }
            *closed = true;
        }

        let deadline = Instant::now() + timeout;
        let drained = self.flush_inner(timeout);
        let Some(handle) = self.worker.lock().take() else {
            return drained;
        };

        if !drained || self.sender.send_deadline(Command::Stop, deadline).is_err() {
            warn!(topic = %self.topic, "remote log sink did not drain before close");
            return false;
        }

        if handle.join().is_err() {
            error!(topic = %self.topic, "remote log sink worker panicked");
            return false;
        }
        debug!(topic = %self.topic, "remote log sink closed");
        true
    }

    fn drop_message(&self) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.metrics.remote_dropped_total.inc();
    }
}

impl Sink for RemoteSink {
    fn emit(&self, record: &LogRecord) {
        let closed = self.closed.read();
        if *closed {
            self.drop_message();
            return;
        }

        let msg = RemoteMessage::from_record(record, self.formatter.format(record));
        match self.sender.try_send(Command::Publish(msg)) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.drop_message();
            }
        }
    }
}

impl Drop for RemoteSink {
    fn drop(&mut self) {
        self.close(Duration::from_secs(1));
    }
}

fn run_worker(
    receiver: Receiver<Command>,
    transport: Arc<dyn Transport>,
    topic: String,
    counters: Arc<Counters>,
    metrics: Arc<LoggingMetrics>,
) {
    for command in receiver.iter() {
        match command {
            Command::Publish(msg) => {
                if publish_one(transport.as_ref(), &topic, &msg) {
                    counters.published.fetch_add(1, Ordering::Relaxed);
                    metrics.remote_published_total.inc();
                } else {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    metrics.remote_failed_total.inc();
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            Command::Stop => break,
        }
    }
}

fn publish_one(transport: &dyn Transport, topic: &str, msg: &RemoteMessage) -> bool {
    let payload = match msg.to_json() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(topic, error = %e, "failed to encode remote log message");
            return false;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| transport.publish(topic, &payload))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(topic, error = %e, "failed to publish remote log message");
            false
        }
        Err(_) => {
            error!(topic, "transport panicked while publishing remote log message");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;
    use crate::record::CallerLocation;
    use crate::testing::{FailingTransport, FailureKind};
    use crate::transport::LocalBus;

    const WAIT: Duration = Duration::from_secs(5);

    fn metrics() -> Arc<LoggingMetrics> {
        Arc::new(LoggingMetrics::new().unwrap())
    }

    fn record(level: Level, msg: &str) -> LogRecord {
        LogRecord::new(level, msg, "x.y", CallerLocation::unknown())
    }

    #[test]
    fn test_remote_message_preserves_record_fields() {
        let before = unix_seconds(SystemTime::now());
        let rec = record(Level::INFO, "hello");
        let msg = RemoteMessage::from_record(&rec, MessageFormatter.format(&rec));
        let after = unix_seconds(SystemTime::now());

        assert_eq!(msg.msg, "hello");
        assert_eq!(msg.level_no, 20);
        assert_eq!(msg.level_name, "INFO");
        assert_eq!(msg.logger_name, "x.y");
        assert!(msg.timestamp >= before && msg.timestamp <= after);
    }

    #[test]
    fn test_wire_field_names() {
        let msg = RemoteMessage {
            timestamp: 1.5,
            msg: "m".to_string(),
            level_no: 29,
            level_name: "NETWORK".to_string(),
            logger_name: "a.b".to_string(),
        };
        let value: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        assert_eq!(obj["timestamp"], serde_json::json!(1.5));
        assert_eq!(obj["msg"], "m");
        assert_eq!(obj["level_no"], 29);
        assert_eq!(obj["level_name"], "NETWORK");
        assert_eq!(obj["logger_name"], "a.b");
    }

    #[test]
    fn test_default_topic() {
        assert_eq!(default_topic(Some("abc123")), "tidings/abc123/log");
        assert_eq!(default_topic(None), "tidings/unknown/log");
        assert_eq!(default_topic(Some("  ")), "tidings/unknown/log");

        let config = RemoteSinkConfig {
            uid: Some("abc123".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolved_topic(), "tidings/abc123/log");

        let config = RemoteSinkConfig {
            topic: Some("custom/topic".to_string()),
            uid: Some("abc123".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolved_topic(), "custom/topic");
    }

    #[test]
    fn test_emit_publishes_to_bus() {
        let bus = Arc::new(LocalBus::new());
        let sub = bus.subscribe("logs/test");
        let config = RemoteSinkConfig {
            topic: Some("logs/test".to_string()),
            ..Default::default()
        };
        let sink = RemoteSink::new(bus.clone(), &config, metrics()).unwrap();

        sink.emit(&record(Level::WARNING, "disk low"));
        assert!(sink.flush(WAIT));

        let received = sub.receiver.try_recv().unwrap();
        let msg: RemoteMessage = serde_json::from_slice(&received.payload).unwrap();
        assert_eq!(msg.msg, "disk low");
        assert_eq!(msg.level_name, "WARNING");
        assert_eq!(sink.stats().published, 1);
    }

    #[test]
    fn test_transport_error_is_swallowed() {
        let transport = Arc::new(FailingTransport::new(FailureKind::Error));
        let m = metrics();
        let sink = RemoteSink::new(transport.clone(), &RemoteSinkConfig::default(), m.clone()).unwrap();

        sink.emit(&record(Level::ERROR, "first"));
        sink.emit(&record(Level::ERROR, "second"));
        assert!(sink.flush(WAIT));

        let stats = sink.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.published, 0);
        assert_eq!(m.remote_failed_total.get(), 2);
        assert_eq!(transport.attempts(), 2);
    }

    #[test]
    fn test_transport_panic_keeps_worker_alive() {
        let transport = Arc::new(FailingTransport::new(FailureKind::PanicOnce));
        let sink = RemoteSink::new(transport.clone(), &RemoteSinkConfig::default(), metrics()).unwrap();

        sink.emit(&record(Level::ERROR, "boom"));
        sink.emit(&record(Level::INFO, "after"));
        assert!(sink.flush(WAIT));

        let stats = sink.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.published, 1);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let transport = Arc::new(FailingTransport::new(FailureKind::Block));
        let config = RemoteSinkConfig {
            queue_capacity: 2,
            ..Default::default()
        };
        let sink = RemoteSink::new(transport.clone(), &config, metrics()).unwrap();

        // Worker takes the first message and blocks inside the transport
        sink.emit(&record(Level::INFO, "0"));
        assert!(transport.wait_for_attempts(1, WAIT));

        for i in 1..=10 {
            sink.emit(&record(Level::INFO, &i.to_string()));
        }
        let stats = sink.stats();
        assert_eq!(stats.queued, 3);
        assert_eq!(stats.dropped, 8);

        transport.release();
        assert!(sink.close(WAIT));
        assert_eq!(sink.stats().published, 3);
    }

    #[test]
    fn test_close_is_idempotent_and_stops_emission() {
        let bus = Arc::new(LocalBus::new());
        let sink = RemoteSink::new(bus, &RemoteSinkConfig::default(), metrics()).unwrap();

        assert!(sink.close(WAIT));
        assert!(sink.close(WAIT));
        assert!(sink.is_closed());
        assert!(!sink.flush(WAIT));

        sink.emit(&record(Level::INFO, "late"));
        assert_eq!(sink.stats().dropped, 1);
    }

    #[test]
    fn test_close_racing_emitters_keeps_counts_consistent() {
        let config = RemoteSinkConfig {
            queue_capacity: 4096,
            ..Default::default()
        };
        let bus = Arc::new(LocalBus::new());
        let sink = Arc::new(RemoteSink::new(bus, &config, metrics()).unwrap());
        let per_thread: u64 = 500;

        let emitters: Vec<_> = (0..4)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        sink.emit(&record(Level::INFO, &i.to_string()));
                    }
                })
            })
            .collect();

        assert!(sink.close(WAIT));
        for emitter in emitters {
            emitter.join().unwrap();
        }

        // Everything counted as queued was handed to the transport
        let stats = sink.stats();
        assert_eq!(stats.queued + stats.dropped, 4 * per_thread);
        assert_eq!(stats.published + stats.failed, stats.queued);
    }

    #[test]
    fn test_ships_every_level_the_logger_lets_through() {
        let bus = Arc::new(LocalBus::new());
        let sink = RemoteSink::new(bus, &RemoteSinkConfig::default(), metrics()).unwrap();
        assert_eq!(sink.threshold(), Level::NOTSET);
        assert!(sink.accepts(&record(Level::new(1), "faint")));
    }
}
