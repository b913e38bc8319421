//! # Firewatch: live telemetry console for a gas/flame sensor node
//!
//! A real-time ingestion pipeline for the line-oriented telemetry an
//! embedded fire-risk sensor node emits over its USB serial link or its
//! onboard server-push event stream. The architecture separates the
//! transport-owning backend from whatever presentation layer is attached.
//!
//! ## Architecture
//!
//! - **Transport**: Serial (115200 8N1) and SSE implementations behind one
//!   trait, at most one active at a time
//! - **Protocol**: Line framing across chunked reads, plus a strict record
//!   parser with layout fallback for older firmware revisions
//! - **Aggregation**: Bounded rolling chart series, event log, and derived
//!   classifications (trend, gas level, flame persistence, state changes)
//! - **Communication**: Crossbeam channels between the worker thread and
//!   the presentation layer
//!
//! ## Configuration
//!
//! Application state (configuration, last used transport) is stored in the
//! platform-appropriate data directory under `firewatch-rs`:
//!
//! - **Linux**: `~/.local/share/firewatch-rs/`
//! - **macOS**: `~/Library/Application Support/firewatch-rs/`
//! - **Windows**: `%APPDATA%\firewatch-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use firewatch_rs::{
//!     backend::{TelemetryBackend, TelemetryMessage},
//!     config::AppConfig,
//! };
//!
//! fn main() {
//!     let config = AppConfig::load_or_default(None);
//!     let (backend, dashboard) = TelemetryBackend::new(config);
//!
//!     std::thread::spawn(move || backend.run());
//!
//!     dashboard.connect_stream(None);
//!     loop {
//!         for msg in dashboard.drain() {
//!             if let TelemetryMessage::Sample(facts) = msg {
//!                 println!("risk {:.1} ({})", facts.sample.risk, facts.gas_level);
//!             }
//!         }
//!     }
//! }
//! ```

pub mod aggregate;
pub mod backend;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use aggregate::Aggregator;
pub use backend::{DashboardHandle, TelemetryBackend, TelemetryCommand, TelemetryMessage};
pub use config::{AppConfig, ConsoleState};
pub use error::{FirewatchError, Result};
pub use protocol::{parse_record, LineFramer};
pub use transport::{Transport, TransportRead};
pub use types::{ConnectionPhase, DisplayFacts, Sample, SystemState};
