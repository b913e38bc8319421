//! Ingestion worker thread
//!
//! This module contains the worker loop that owns the active transport and
//! the whole ingestion pipeline. It communicates with the presentation
//! layer through crossbeam channels.
//!
//! # Responsibilities
//!
//! - **Command processing**: connect/disconnect/reconnect/shutdown requests
//! - **Transport ownership**: at most one transport is open at any time;
//!   opening a new one always closes the previous one first
//! - **Ingestion**: raw chunks run through the line framer, completed lines
//!   through the record parser, samples through the aggregator
//! - **Publishing**: display facts, phase changes, log events and stats go
//!   out on the message channel; data messages use `try_send` so a stalled
//!   consumer can never block ingestion
//!
//! # Reconnection
//!
//! Aggregation and framing state survive transport failures and switches
//! on purpose: a brief Wi-Fi dropout should not blank the chart or forget
//! the last declared state.

use crate::aggregate::Aggregator;
use crate::backend::{TelemetryCommand, TelemetryMessage};
use crate::config::AppConfig;
use crate::protocol::{parse_record, LineFramer};
use crate::transport::{
    available_ports, EventStreamTransport, SerialTransport, Transport, TransportRead,
};
use crate::types::{ConnectionPhase, IngestStats, TransportKind};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "mock-transport")]
use crate::transport::ScriptedTransport;

/// How often stats are published while a transport is attached
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Sleep while no transport is attached
const IDLE_SLEEP: Duration = Duration::from_millis(20);

/// Sleep after a read that produced nothing
const QUIET_SLEEP: Duration = Duration::from_millis(5);

/// The worker that owns the transport and the ingestion pipeline.
pub struct TelemetryWorker {
    /// Application configuration
    config: AppConfig,
    /// Command receiver
    command_rx: Receiver<TelemetryCommand>,
    /// Message sender
    message_tx: Sender<TelemetryMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// The single active transport, if any
    transport: Option<Box<dyn Transport>>,
    /// Line framer for chunk-oriented transports
    framer: LineFramer,
    /// Rolling aggregation state
    aggregator: Aggregator,
    /// Current connection phase
    phase: ConnectionPhase,
    /// Stream URL of the most recent stream connect, for manual reconnects
    last_stream_url: Option<String>,
    /// Pipeline counters
    stats: IngestStats,
    /// Last time stats were published
    last_stats_time: Instant,
}

impl TelemetryWorker {
    /// Create a new worker
    pub fn new(
        config: AppConfig,
        command_rx: Receiver<TelemetryCommand>,
        message_tx: Sender<TelemetryMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let chart_window = config.chart.window;
        Self {
            config,
            command_rx,
            message_tx,
            running,
            transport: None,
            framer: LineFramer::new(),
            aggregator: Aggregator::new(chart_window),
            phase: ConnectionPhase::Idle,
            last_stream_url: None,
            stats: IngestStats::default(),
            last_stats_time: Instant::now(),
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Telemetry worker started");

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();
            self.service_transport();

            if self.transport.is_some() && self.last_stats_time.elapsed() >= STATS_INTERVAL {
                self.send_stats();
                self.last_stats_time = Instant::now();
            }
        }

        // Cleanup
        self.release_transport();

        let _ = self.message_tx.send(TelemetryMessage::Shutdown);
        tracing::info!("Telemetry worker stopped");
    }

    /// Process pending commands
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: TelemetryCommand) {
        match cmd {
            TelemetryCommand::ConnectSerial { port } => {
                self.connect_serial(port);
            }
            TelemetryCommand::ConnectStream { url } => {
                self.connect_stream(url);
            }
            TelemetryCommand::Reconnect => {
                self.log_event("Manual reconnection attempt...");
                self.connect_stream(None);
            }
            TelemetryCommand::Disconnect => {
                if self.transport.is_some() {
                    self.release_transport();
                    self.log_event("Disconnected");
                    self.set_phase(ConnectionPhase::Idle);
                }
            }
            TelemetryCommand::RequestStats => {
                self.send_stats();
            }
            TelemetryCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
            #[cfg(feature = "mock-transport")]
            TelemetryCommand::ConnectMock(script) => {
                self.open_transport(Box::new(ScriptedTransport::new(script)));
            }
        }
    }

    /// Resolve a serial port and open the serial transport
    fn connect_serial(&mut self, port: Option<String>) {
        let port = port
            .or_else(|| self.config.serial.port.clone())
            .or_else(|| available_ports().into_iter().next());

        let Some(port) = port else {
            // Surfaced prominently by the presentation layer, not retried.
            let notice =
                "No serial ports detected. Plug the node in via USB or use its event stream.";
            let _ = self
                .message_tx
                .send(TelemetryMessage::UnsupportedEnvironment(notice.to_string()));
            return;
        };

        let transport = SerialTransport::new(port, self.config.serial.baud_rate);
        self.open_transport(Box::new(transport));
    }

    /// Open (or re-open) the event-stream transport
    fn connect_stream(&mut self, url: Option<String>) {
        let url = url
            .or_else(|| self.last_stream_url.clone())
            .unwrap_or_else(|| self.config.stream.url.clone());

        match EventStreamTransport::new(url.clone(), self.config.stream.retry_delay()) {
            Ok(transport) => {
                self.last_stream_url = Some(url);
                self.open_transport(Box::new(transport));
            }
            Err(e) => {
                tracing::error!(error = %e, url = %url, "failed to build stream client");
                self.log_event(format!("Connection failed: {e}"));
                self.try_send(TelemetryMessage::TransportError(e.to_string()));
                self.set_phase(ConnectionPhase::Idle);
            }
        }
    }

    /// Close any active transport and open the given one.
    ///
    /// This is the mutual-exclusion point: the previous transport is
    /// always released before the new one opens, so two transports are
    /// never live at once.
    fn open_transport(&mut self, mut transport: Box<dyn Transport>) {
        self.release_transport();
        self.set_phase(ConnectionPhase::Connecting);

        let kind = transport.kind();
        let description = transport.describe();

        match transport.open() {
            Ok(()) => {
                self.transport = Some(transport);
                match kind {
                    TransportKind::Serial => {
                        self.set_phase(ConnectionPhase::Connected);
                        self.log_event(format!("Connected via {description}"));
                    }
                    TransportKind::Stream => {
                        // Connected once the stream reports Opened.
                        self.log_event(format!("Connecting to {description}"));
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, transport = %description, "failed to open transport");
                self.log_event(format!("Connection failed: {e}"));
                self.try_send(TelemetryMessage::TransportError(e.to_string()));
                self.set_phase(ConnectionPhase::Idle);
            }
        }
    }

    /// Close and drop the active transport, if any
    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            tracing::debug!("released {}", transport.describe());
        }
    }

    /// Perform one transport read and dispatch the outcome
    fn service_transport(&mut self) {
        let outcome = match self.transport.as_mut() {
            Some(transport) => transport.read(),
            None => {
                std::thread::sleep(IDLE_SLEEP);
                return;
            }
        };

        match outcome {
            Ok(TransportRead::Opened) => {
                self.set_phase(ConnectionPhase::Connected);
                self.log_event("Event stream connected");
            }
            Ok(TransportRead::Chunk(text)) => {
                let lines = self.framer.feed(&text);
                for line in lines {
                    self.ingest_line(&line);
                }
            }
            Ok(TransportRead::Record(line)) => {
                self.ingest_line(&line);
            }
            Ok(TransportRead::Idle) => {
                std::thread::sleep(QUIET_SLEEP);
            }
            Ok(TransportRead::Eof) => {
                self.log_event("Transport reached end of data");
                self.release_transport();
                self.set_phase(ConnectionPhase::Closed);
            }
            Ok(TransportRead::Reconnecting) => {
                if self.phase != ConnectionPhase::Reconnecting {
                    self.stats.reconnects += 1;
                    self.set_phase(ConnectionPhase::Reconnecting);
                    self.log_event("Connection lost. Retrying...");
                }
                std::thread::sleep(QUIET_SLEEP);
            }
            Err(e) => {
                self.stats.read_errors += 1;
                tracing::error!(error = %e, "transport read error");
                self.log_event(format!("Read error: {e}"));
                self.try_send(TelemetryMessage::TransportError(e.to_string()));
                self.release_transport();
                self.set_phase(ConnectionPhase::Idle);
            }
        }
    }

    /// Parse one complete line and publish the result
    fn ingest_line(&mut self, line: &str) {
        self.stats.lines_seen += 1;
        match parse_record(line) {
            Some(sample) => {
                self.stats.samples_parsed += 1;
                let facts = self.aggregator.ingest(sample);
                if facts.state_changed {
                    self.log_event(format!("System state changed to {}", facts.sample.state));
                }
                self.try_send(TelemetryMessage::Sample(Box::new(facts)));
            }
            None => {
                // Boot banners and baseline-learning prints share the
                // line; dropping them is not an error.
                self.stats.parse_rejects += 1;
                tracing::trace!(line, "discarded unrecognized line");
            }
        }
    }

    /// Update the connection phase and notify the presentation layer
    fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.phase != phase {
            self.phase = phase;
            tracing::info!(%phase, "connection phase changed");
            let _ = self.message_tx.send(TelemetryMessage::Phase(phase));
        }
    }

    /// Record an event-log entry and forward it
    fn log_event(&mut self, message: impl Into<String>) {
        let event = self.aggregator.record_event(message);
        tracing::info!("{}", event.message);
        let _ = self.message_tx.send(TelemetryMessage::LogEvent(event));
    }

    /// Publish current stats (using try_send for backpressure)
    fn send_stats(&mut self) {
        self.try_send(TelemetryMessage::Stats(self.stats.clone()));
    }

    /// Try to send a message, counting drops if the queue is full
    fn try_send(&mut self, msg: TelemetryMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.stats.dropped_messages += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FirewatchError;
    use crate::transport::MockTransport;
    use crate::types::SystemState;
    use crossbeam_channel::bounded;
    use mockall::Sequence;

    fn create_test_worker() -> (
        TelemetryWorker,
        Receiver<TelemetryMessage>,
        Sender<TelemetryCommand>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(16);
        let (msg_tx, msg_rx) = bounded(256);
        let running = Arc::new(AtomicBool::new(true));
        let config = AppConfig::default();

        let worker = TelemetryWorker::new(config, cmd_rx, msg_tx, running);

        (worker, msg_rx, cmd_tx)
    }

    fn connected_mock(seq: &mut Sequence) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_kind().return_const(TransportKind::Serial);
        mock.expect_describe().return_const("mock serial".to_string());
        mock.expect_open()
            .times(1)
            .in_sequence(seq)
            .returning(|| Ok(()));
        mock
    }

    #[test]
    fn test_worker_creation() {
        let (worker, _, _) = create_test_worker();
        assert_eq!(worker.phase, ConnectionPhase::Idle);
        assert!(worker.transport.is_none());
    }

    #[test]
    fn test_open_closes_previous_transport_first() {
        let (mut worker, msg_rx, _) = create_test_worker();
        let mut seq = Sequence::new();

        let mut first = connected_mock(&mut seq);
        // The previous transport must be closed before the next opens.
        first
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());

        let second = connected_mock(&mut seq);

        worker.open_transport(Box::new(first));
        assert_eq!(worker.phase, ConnectionPhase::Connected);

        worker.open_transport(Box::new(second));
        assert_eq!(worker.phase, ConnectionPhase::Connected);

        while msg_rx.try_recv().is_ok() {}
    }

    #[test]
    fn test_failed_open_stays_idle() {
        let (mut worker, msg_rx, _) = create_test_worker();

        let mut mock = MockTransport::new();
        mock.expect_kind().return_const(TransportKind::Serial);
        mock.expect_describe().return_const("mock serial".to_string());
        mock.expect_open()
            .times(1)
            .returning(|| Err(FirewatchError::Transport("device busy".to_string())));

        worker.open_transport(Box::new(mock));

        assert_eq!(worker.phase, ConnectionPhase::Idle);
        assert!(worker.transport.is_none());

        let messages: Vec<_> = std::iter::from_fn(|| msg_rx.try_recv().ok()).collect();
        assert!(messages
            .iter()
            .any(|m| matches!(m, TelemetryMessage::TransportError(e) if e.contains("device busy"))));
        assert!(messages
            .iter()
            .any(|m| matches!(m, TelemetryMessage::Phase(ConnectionPhase::Connecting))));
        assert!(messages
            .iter()
            .any(|m| matches!(m, TelemetryMessage::Phase(ConnectionPhase::Idle))));
    }

    #[test]
    fn test_chunk_reads_flow_through_framer() {
        let (mut worker, msg_rx, _) = create_test_worker();

        let mut seq = Sequence::new();
        let mut mock = connected_mock(&mut seq);
        mock.expect_read().times(1).returning(|| {
            Ok(TransportRead::Chunk(
                "Gas:1200,ZScore:0.5,Risk:2.5,Flame:0,State:SAFE\nGas:13".to_string(),
            ))
        });

        worker.open_transport(Box::new(mock));
        worker.service_transport();

        assert_eq!(worker.stats.lines_seen, 1);
        assert_eq!(worker.stats.samples_parsed, 1);
        assert_eq!(worker.framer.remainder(), "Gas:13");
        assert_eq!(worker.aggregator.series().len(), 1);

        let got_sample = std::iter::from_fn(|| msg_rx.try_recv().ok())
            .any(|m| matches!(m, TelemetryMessage::Sample(_)));
        assert!(got_sample);
    }

    #[test]
    fn test_rejected_lines_are_counted_not_published() {
        let (mut worker, msg_rx, _) = create_test_worker();

        worker.ingest_line("Learning Baseline... 412.33");

        assert_eq!(worker.stats.lines_seen, 1);
        assert_eq!(worker.stats.parse_rejects, 1);
        let got_sample = std::iter::from_fn(|| msg_rx.try_recv().ok())
            .any(|m| matches!(m, TelemetryMessage::Sample(_)));
        assert!(!got_sample);
    }

    #[test]
    fn test_state_change_emits_log_event() {
        let (mut worker, msg_rx, _) = create_test_worker();

        worker.ingest_line("Gas:100,ZScore:0.0,Risk:1,Flame:0,State:SAFE");
        worker.ingest_line("Gas:100,ZScore:0.0,Risk:99,Flame:1,State:EMERGENCY");

        assert_eq!(worker.aggregator.last_state(), Some(&SystemState::from_word("EMERGENCY")));

        let messages: Vec<_> = std::iter::from_fn(|| msg_rx.try_recv().ok()).collect();
        assert!(messages.iter().any(|m| matches!(
            m,
            TelemetryMessage::LogEvent(e) if e.message.contains("EMERGENCY")
        )));
        let changed: Vec<bool> = messages
            .iter()
            .filter_map(|m| match m {
                TelemetryMessage::Sample(facts) => Some(facts.state_changed),
                _ => None,
            })
            .collect();
        assert_eq!(changed, vec![false, true]);
    }

    #[test]
    fn test_eof_releases_transport() {
        let (mut worker, _msg_rx, _) = create_test_worker();

        let mut seq = Sequence::new();
        let mut mock = connected_mock(&mut seq);
        mock.expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(TransportRead::Eof));
        mock.expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());

        worker.open_transport(Box::new(mock));
        worker.service_transport();

        assert!(worker.transport.is_none());
        assert_eq!(worker.phase, ConnectionPhase::Closed);
    }

    #[test]
    fn test_read_error_releases_and_returns_idle() {
        let (mut worker, msg_rx, _) = create_test_worker();

        let mut seq = Sequence::new();
        let mut mock = connected_mock(&mut seq);
        mock.expect_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(FirewatchError::Transport("cable pulled".to_string())));
        mock.expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());

        worker.open_transport(Box::new(mock));
        worker.service_transport();

        assert!(worker.transport.is_none());
        assert_eq!(worker.phase, ConnectionPhase::Idle);
        assert_eq!(worker.stats.read_errors, 1);

        let reported = std::iter::from_fn(|| msg_rx.try_recv().ok())
            .any(|m| matches!(m, TelemetryMessage::TransportError(e) if e.contains("cable pulled")));
        assert!(reported);
    }

    #[test]
    fn test_reconnecting_counted_once_per_outage() {
        let (mut worker, _msg_rx, _) = create_test_worker();

        let mut seq = Sequence::new();
        let mut mock = MockTransport::new();
        mock.expect_kind().return_const(TransportKind::Stream);
        mock.expect_describe().return_const("mock stream".to_string());
        mock.expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        mock.expect_read()
            .times(2)
            .returning(|| Ok(TransportRead::Reconnecting));

        worker.open_transport(Box::new(mock));
        worker.service_transport();
        worker.service_transport();

        assert_eq!(worker.phase, ConnectionPhase::Reconnecting);
        assert_eq!(worker.stats.reconnects, 1);
    }

    #[test]
    fn test_aggregation_survives_transport_switch() {
        let (mut worker, _msg_rx, _) = create_test_worker();

        worker.ingest_line("Gas:100,ZScore:0.0,Risk:1,Flame:0,State:WARNING");

        let mut seq = Sequence::new();
        let mock = connected_mock(&mut seq);
        worker.open_transport(Box::new(mock));

        // The chart and last state carried across the switch.
        assert_eq!(worker.aggregator.series().len(), 1);
        assert_eq!(worker.aggregator.last_state(), Some(&SystemState::Warning));
    }

    #[test]
    fn test_shutdown_command() {
        let (mut worker, _, cmd_tx) = create_test_worker();

        cmd_tx.send(TelemetryCommand::Shutdown).unwrap();
        worker.process_commands();

        assert!(!worker.running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_request_stats_publishes() {
        let (mut worker, msg_rx, cmd_tx) = create_test_worker();

        cmd_tx.send(TelemetryCommand::RequestStats).unwrap();
        worker.process_commands();

        let got_stats = std::iter::from_fn(|| msg_rx.try_recv().ok())
            .any(|m| matches!(m, TelemetryMessage::Stats(_)));
        assert!(got_stats);
    }
}
