//! Structured logging walkthrough over an in-process bus
//!
//! This binary combines:
//! - A `LogManager` configured from the environment and CLI flags
//! - A `LocalBus` standing in for the pub/sub broker, with a subscriber
//!   thread printing every shipped record
//! - A console host application receiving NOTIFY and NETWORK escalations
//!
//! Try: `tidings-demo --remote --uid desk-1`

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{self, select};
use tidings_bins::common::{init_logging, print_stats, CommonArgs};
use tidings_core::escalation::{ApplicationSlot, ApplicationWarning, HostApplication, TestMode};
use tidings_core::logger::LogManager;
use tidings_core::sink::RemoteMessage;
use tidings_core::transport::{BusMessage, LocalBus};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Host application that prints what it is told
struct ConsoleApp;

impl HostApplication for ConsoleApp {
    fn add_application_warning(&self, warning: ApplicationWarning) {
        println!(
            "[warning] {} ({} at {}:{})",
            warning.warning_msg,
            warning.module_name(),
            warning.filename(),
            warning.line_number()
        );
        if let Some(stack) = warning.stack_info() {
            println!("{stack}");
        }
    }

    fn notify(&self, text: &str) {
        println!("[notify] {text}");
    }
}

fn print_message(msg: &BusMessage) {
    match serde_json::from_slice::<RemoteMessage>(&msg.payload) {
        Ok(m) => println!(
            "[{}] {:.3} {} {}: {}",
            msg.topic, m.timestamp, m.logger_name, m.level_name, m.msg
        ),
        Err(e) => tracing::warn!("undecodable message on {}: {}", msg.topic, e),
    }
}

struct Connector;

impl Connector {
    fn reconnect(&self, mgr: &LogManager) {
        let log = mgr.logger_for::<Connector>();
        log.network(
            "websocket closed with code 1006, reconnecting",
            Some("Exchange connection lost. Check your network."),
        );
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = CommonArgs::parse();
    let config = args.logging_config()?;

    // Initialize logging
    init_logging(&config)?;

    tracing::info!("=== Tidings: structured logging demo ===");

    let bus = Arc::new(LocalBus::new());
    let topic = config.remote.sink.resolved_topic();
    let subscription = bus.subscribe(&topic);
    let (done_tx, done_rx) = channel::bounded::<()>(1);

    let printer = thread::Builder::new()
        .name("tidings-demo-subscriber".to_string())
        .spawn(move || loop {
            select! {
                recv(subscription.receiver) -> msg => match msg {
                    Ok(msg) => print_message(&msg),
                    Err(_) => break,
                },
                recv(done_rx) -> _ => {
                    // Everything shipped before shutdown is already queued
                    subscription.receiver.try_iter().for_each(|msg| print_message(&msg));
                    break;
                }
            }
        })
        .context("failed to spawn subscriber thread")?;

    // The application comes up after loggers may already exist
    ApplicationSlot::global().install(Arc::new(ConsoleApp));

    let test_mode = if args.production {
        TestMode::Forced(false)
    } else {
        TestMode::Detect
    };
    let mgr = LogManager::builder()
        .config(config.clone())
        .transport(bus.clone())
        .test_mode(test_mode)
        .build()?;

    if config.remote.enabled {
        tracing::info!("Shipping records to {}", topic);
    } else {
        tracing::info!("Remote shipping disabled (pass --remote to enable)");
    }

    let strategy = mgr.get_logger("strategy.maker");
    strategy.debug("quote recalculated");
    strategy.info("quotes placed on both sides");
    strategy.notify("Order filled: 0.5 BTC @ 64,210");

    Connector.reconnect(&mgr);

    mgr.get_logger("risk").error("position limit breached");

    if !mgr.shutdown(SHUTDOWN_TIMEOUT) {
        tracing::warn!("remote sink did not drain within {:?}", SHUTDOWN_TIMEOUT);
    }
    if let Some(remote) = mgr.remote_sink() {
        print_stats(&remote.stats());
    }

    let _ = done_tx.send(());
    if printer.join().is_err() {
        tracing::error!("subscriber thread panicked");
    }

    Ok(())
}
