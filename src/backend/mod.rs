//! Backend module for transport management and ingestion
//!
//! This module runs the whole ingestion pipeline in a separate thread so
//! the embedding application stays responsive. It uses crossbeam channels
//! for thread-safe communication with whatever presentation layer is
//! attached.
//!
//! # Architecture
//!
//! The worker runs in a separate thread, communicating via channels:
//!
//! - [`TelemetryCommand`] - Messages sent to the worker (connect, reconnect,
//!   disconnect, shutdown)
//! - [`TelemetryMessage`] - Messages sent from the worker (samples, phase
//!   changes, log events, errors, stats)
//! - [`DashboardHandle`] - Presentation-side handle for sending commands and
//!   receiving messages
//! - [`TelemetryBackend`] - Main backend entry point that owns the worker
//!   state
//!
//! # Example
//!
//! ```ignore
//! use firewatch_rs::backend::{TelemetryBackend, TelemetryMessage};
//! use firewatch_rs::config::AppConfig;
//!
//! let config = AppConfig::default();
//! let (backend, dashboard) = TelemetryBackend::new(config);
//!
//! std::thread::spawn(move || backend.run());
//!
//! dashboard.connect_stream(None);
//! for msg in dashboard.drain() {
//!     if let TelemetryMessage::Sample(facts) = msg {
//!         // Render the new sample
//!     }
//! }
//! ```

pub mod worker;

pub use worker::TelemetryWorker;

use crate::config::AppConfig;
use crate::types::{ConnectionPhase, DisplayFacts, IngestStats, LogEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[cfg(feature = "mock-transport")]
use crate::transport::MockScript;

/// Capacity of the command channel
const COMMAND_QUEUE: usize = 64;

/// Capacity of the message channel. Bounded for backpressure: the node
/// emits ~20 records/s, so this holds several minutes of samples before
/// drops start being counted.
const MESSAGE_QUEUE: usize = 4096;

/// Message sent to the worker
#[derive(Debug, Clone)]
pub enum TelemetryCommand {
    /// Open the serial transport. `None` falls back to the configured
    /// port, or the first enumerated one.
    ConnectSerial { port: Option<String> },
    /// Open the event-stream transport. `None` falls back to the
    /// configured URL.
    ConnectStream { url: Option<String> },
    /// Close the current stream transport and open a fresh one.
    Reconnect,
    /// Close the active transport, keeping aggregation state.
    Disconnect,
    /// Publish stats immediately.
    RequestStats,
    /// Stop the worker.
    Shutdown,
    /// Attach a scripted transport (only available with the
    /// mock-transport feature).
    #[cfg(feature = "mock-transport")]
    ConnectMock(MockScript),
}

/// Message sent from the worker
#[derive(Debug, Clone)]
pub enum TelemetryMessage {
    /// The connection phase changed
    Phase(ConnectionPhase),
    /// A transport failed to open or died mid-session
    TransportError(String),
    /// No local transport exists in this environment; surfaced once and
    /// more prominently than a log line
    UnsupportedEnvironment(String),
    /// A new sample with its derived display facts
    Sample(Box<DisplayFacts>),
    /// An entry was appended to the event log
    LogEvent(LogEvent),
    /// Periodic pipeline statistics
    Stats(IngestStats),
    /// The worker is shutting down
    Shutdown,
}

/// Presentation-side handle to the backend
pub struct DashboardHandle {
    /// Receiver for worker messages
    pub receiver: Receiver<TelemetryMessage>,
    /// Sender for commands to the worker
    pub command_sender: Sender<TelemetryCommand>,
}

impl DashboardHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<TelemetryMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<TelemetryMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the worker
    pub fn send_command(&self, cmd: TelemetryCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    /// Request the serial transport
    pub fn connect_serial(&self, port: Option<String>) {
        let _ = self
            .command_sender
            .send(TelemetryCommand::ConnectSerial { port });
    }

    /// Request the event-stream transport
    pub fn connect_stream(&self, url: Option<String>) {
        let _ = self
            .command_sender
            .send(TelemetryCommand::ConnectStream { url });
    }

    /// Request a manual stream reconnect
    pub fn reconnect(&self) {
        let _ = self.command_sender.send(TelemetryCommand::Reconnect);
    }

    /// Request disconnection
    pub fn disconnect(&self) {
        let _ = self.command_sender.send(TelemetryCommand::Disconnect);
    }

    /// Request an immediate stats message
    pub fn request_stats(&self) {
        let _ = self.command_sender.send(TelemetryCommand::RequestStats);
    }

    /// Attach a scripted transport (only available with the
    /// mock-transport feature)
    #[cfg(feature = "mock-transport")]
    pub fn connect_mock(&self, script: MockScript) {
        let _ = self
            .command_sender
            .send(TelemetryCommand::ConnectMock(script));
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(TelemetryCommand::Shutdown);
    }
}

/// The telemetry backend that runs in a separate thread
pub struct TelemetryBackend {
    /// Configuration
    config: AppConfig,
    /// Receiver for commands
    command_receiver: Receiver<TelemetryCommand>,
    /// Sender for messages
    message_sender: Sender<TelemetryMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl TelemetryBackend {
    /// Create a new backend with communication channels
    pub fn new(config: AppConfig) -> (Self, DashboardHandle) {
        let (cmd_tx, cmd_rx) = bounded(COMMAND_QUEUE);
        let (msg_tx, msg_rx) = bounded(MESSAGE_QUEUE);

        let backend = Self {
            config,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let dashboard = DashboardHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, dashboard)
    }

    /// Run the worker loop until shutdown
    pub fn run(self) {
        let mut worker = TelemetryWorker::new(
            self.config,
            self.command_receiver,
            self.message_sender,
            self.running,
        );
        worker.run();
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
