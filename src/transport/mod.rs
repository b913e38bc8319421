//! Transports carrying telemetry records from the sensor node
//!
//! Records reach the console over one of two channels: the node's USB
//! serial link, or the server-push event stream it hosts when reachable
//! over Wi-Fi. Both sit behind the [`Transport`] trait so the ingestion
//! worker is indifferent to which one is active, and a scripted
//! implementation exists for testing without hardware.
//!
//! # Components
//!
//! - [`SerialTransport`] - Local serial link (115200 baud, 8N1)
//! - [`EventStreamTransport`] - SSE client for the device's `/events`
//!   endpoint, with EventSource-style automatic reconnection
//! - [`ScriptedTransport`] - Mock fed from a canned script (feature-gated)
//!
//! A transport never frames records itself unless the wire already does:
//! serial reads surface as raw [`TransportRead::Chunk`]s for the worker's
//! line framer, while the event stream dispatches one complete
//! [`TransportRead::Record`] per server event.

pub mod serial;
pub mod stream;

#[cfg(feature = "mock-transport")]
pub mod mock;

pub use serial::SerialTransport;
pub use stream::EventStreamTransport;

#[cfg(feature = "mock-transport")]
pub use mock::{MockScript, ScriptedRead, ScriptedTransport};

use crate::error::Result;
use crate::types::TransportKind;

/// Outcome of a single transport read.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportRead {
    /// The transport finished an asynchronous open and is now live.
    Opened,
    /// Raw text that may contain any number of partial or complete lines.
    Chunk(String),
    /// One complete record, already framed by the wire protocol.
    Record(String),
    /// Nothing available right now.
    Idle,
    /// The stream ended normally.
    Eof,
    /// The connection was lost; the transport will retry on later reads.
    Reconnecting,
}

/// Unified interface over the record-carrying channels.
///
/// Implementations must be `Send`: the worker thread takes ownership of
/// the active transport. `read` is expected to block only briefly (the
/// real implementations use short read timeouts) so the worker stays
/// responsive to commands between reads.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Acquire the underlying resource.
    ///
    /// The serial link opens synchronously; the event stream defers its
    /// HTTP connection to the first `read` and signals readiness with
    /// [`TransportRead::Opened`], mirroring how a browser `EventSource`
    /// connects in the background.
    fn open(&mut self) -> Result<()>;

    /// Fetch the next chunk, record, or lifecycle signal.
    fn read(&mut self) -> Result<TransportRead>;

    /// Release the underlying resource. Safe to call more than once.
    fn close(&mut self);

    /// Which channel this is.
    fn kind(&self) -> TransportKind;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Names of serial ports currently present on this machine.
///
/// Enumeration failures are logged and reported as "no ports" rather than
/// surfaced; the caller treats an empty list as an unsupported
/// environment.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("serial port enumeration failed: {}", e);
            Vec::new()
        }
    }
}
