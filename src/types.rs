//! Core data types for the Firewatch console
//!
//! This module contains the fundamental data structures used throughout
//! the application for representing telemetry samples, derived display
//! facts, and the bounded rolling state kept for charting.
//!
//! # Main Types
//!
//! - [`Sample`] - One parsed telemetry record from the sensor node
//! - [`SystemState`] - The node's declared safety state (SAFE / WARNING / emergency)
//! - [`DisplayFacts`] - A sample plus everything derived from it for display
//! - [`RollingSeries`] - Fixed-capacity FIFO of recent chart points
//! - [`EventLog`] - Fixed-capacity FIFO of human-readable log entries
//! - [`ConnectionPhase`] - Lifecycle phase of the active transport
//! - [`IngestStats`] - Counters describing pipeline health
//!
//! # Memory Management
//!
//! Both [`RollingSeries`] and [`EventLog`] are ring buffers with a strict
//! capacity; pushing beyond it evicts the oldest entry. Nothing in this
//! module grows without bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of chart points retained for the live chart
pub const CHART_WINDOW: usize = 50;

/// Number of entries retained in the event log
pub const EVENT_LOG_CAP: usize = 50;

/// Gas reading at or above which the level is classified as dangerous
pub const GAS_DANGER_FLOOR: f64 = 2500.0;

/// Gas reading at or above which the level is classified as elevated
pub const GAS_ELEVATED_FLOOR: f64 = 800.0;

/// Trend magnitude beyond which the reading is classified as rising/falling
pub const TREND_THRESHOLD: f64 = 2.0;

/// Consecutive flame detections required for a confirmed fire
pub const FLAME_CONFIRMED_MIN: u32 = 3;

/// The safety state declared by the sensor node in each record.
///
/// Only the literal words `SAFE` and `WARNING` have dedicated variants;
/// every other word the firmware emits (`BOOTUP`, `HIGH_RISK`, `EMERGENCY`,
/// future additions) lands in the emergency display category with the raw
/// word preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemState {
    Safe,
    Warning,
    Emergency(String),
}

impl SystemState {
    /// Map a raw state word from the wire onto a state.
    pub fn from_word(word: &str) -> Self {
        match word {
            "SAFE" => SystemState::Safe,
            "WARNING" => SystemState::Warning,
            other => SystemState::Emergency(other.to_string()),
        }
    }

    /// The raw word as it appeared on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            SystemState::Safe => "SAFE",
            SystemState::Warning => "WARNING",
            SystemState::Emergency(word) => word,
        }
    }

    /// Whether this state belongs to the emergency display category.
    pub fn is_emergency(&self) -> bool {
        matches!(self, SystemState::Emergency(_))
    }
}

impl std::fmt::Display for SystemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parsed telemetry record.
///
/// `trend` and `flame_persist` are absent in older protocol versions; their
/// presence is how the protocol version is inferred.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Raw analog gas-sensor reading
    pub gas: f64,
    /// Statistical deviation of the gas reading from the node's rolling baseline
    pub z_score: f64,
    /// Short-term rate-of-change of the gas reading
    pub trend: Option<f64>,
    /// Composite risk score, expected (not clamped) to the 0-100 display range
    pub risk: f64,
    /// True when the flame sensor currently detects fire (`Flame:1` on the wire)
    pub flame: bool,
    /// Consecutive flame detections so far
    pub flame_persist: Option<u32>,
    /// Declared safety state
    pub state: SystemState,
}

/// Classification of the short-term gas trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendClass {
    Rising,
    Falling,
    #[default]
    Stable,
}

impl TrendClass {
    /// Classify a trend reading; an absent trend is stable.
    pub fn classify(trend: Option<f64>) -> Self {
        match trend {
            Some(t) if t > TREND_THRESHOLD => TrendClass::Rising,
            Some(t) if t < -TREND_THRESHOLD => TrendClass::Falling,
            _ => TrendClass::Stable,
        }
    }
}

impl std::fmt::Display for TrendClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendClass::Rising => write!(f, "Rising"),
            TrendClass::Falling => write!(f, "Falling"),
            TrendClass::Stable => write!(f, "Stable"),
        }
    }
}

/// Classification of the absolute gas level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasLevelClass {
    Danger,
    Elevated,
    #[default]
    Normal,
}

impl GasLevelClass {
    pub fn classify(gas: f64) -> Self {
        if gas >= GAS_DANGER_FLOOR {
            GasLevelClass::Danger
        } else if gas >= GAS_ELEVATED_FLOOR {
            GasLevelClass::Elevated
        } else {
            GasLevelClass::Normal
        }
    }
}

impl std::fmt::Display for GasLevelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasLevelClass::Danger => write!(f, "Danger"),
            GasLevelClass::Elevated => write!(f, "Elevated"),
            GasLevelClass::Normal => write!(f, "Normal"),
        }
    }
}

/// Classification of flame persistence, separating a flicker from a
/// confirmed fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlamePersistClass {
    Confirmed,
    Flicker,
    #[default]
    None,
}

impl FlamePersistClass {
    /// Classify a consecutive-detection count; absent counts as none.
    pub fn classify(persist: Option<u32>) -> Self {
        match persist {
            Some(n) if n >= FLAME_CONFIRMED_MIN => FlamePersistClass::Confirmed,
            Some(n) if n > 0 => FlamePersistClass::Flicker,
            _ => FlamePersistClass::None,
        }
    }
}

impl std::fmt::Display for FlamePersistClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlamePersistClass::Confirmed => write!(f, "Confirmed"),
            FlamePersistClass::Flicker => write!(f, "Flicker"),
            FlamePersistClass::None => write!(f, "None"),
        }
    }
}

/// One point of the live chart, scaled for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// Wall-clock time the sample was ingested
    pub timestamp: DateTime<Utc>,
    /// Risk score, plotted as-is
    pub risk: f64,
    /// Gas reading scaled into the chart's 0-100 range
    pub gas_scaled: f64,
    /// Trend scaled and floored at zero
    pub trend_scaled: f64,
}

/// A sample together with everything the presentation layer needs to
/// render it.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFacts {
    /// The parsed sample
    pub sample: Sample,
    /// True when the declared state differs from the previous sample's
    pub state_changed: bool,
    /// Trend classification
    pub trend: TrendClass,
    /// Gas level classification
    pub gas_level: GasLevelClass,
    /// Flame persistence classification
    pub flame_persist: FlamePersistClass,
    /// The chart point appended to the rolling series for this sample
    pub chart_point: ChartPoint,
}

/// Fixed-capacity FIFO of the most recent chart points.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    points: VecDeque<ChartPoint>,
    capacity: usize,
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::new(CHART_WINDOW)
    }
}

impl RollingSeries {
    /// Create a series retaining at most `capacity` points.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a point, evicting the oldest once the capacity is reached.
    pub fn push(&mut self, point: ChartPoint) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate points oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }

    /// The most recently pushed point.
    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    /// Risk values as `[epoch seconds, risk]` plot points.
    pub fn risk_points(&self) -> Vec<[f64; 2]> {
        self.plot_points(|p| p.risk)
    }

    /// Scaled gas values as `[epoch seconds, gas]` plot points.
    pub fn gas_points(&self) -> Vec<[f64; 2]> {
        self.plot_points(|p| p.gas_scaled)
    }

    /// Scaled trend values as `[epoch seconds, trend]` plot points.
    pub fn trend_points(&self) -> Vec<[f64; 2]> {
        self.plot_points(|p| p.trend_scaled)
    }

    fn plot_points(&self, value: impl Fn(&ChartPoint) -> f64) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|p| [p.timestamp.timestamp_millis() as f64 / 1000.0, value(p)])
            .collect()
    }
}

/// A single entry of the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Fixed-capacity FIFO of human-readable log entries.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(EVENT_LOG_CAP)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a message now, evicting the oldest entry beyond capacity.
    /// Returns the recorded entry for forwarding.
    pub fn record(&mut self, message: impl Into<String>) -> LogEvent {
        let event = LogEvent {
            timestamp: Utc::now(),
            message: message.into(),
        };
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event.clone());
        event
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEvent> {
        self.entries.back()
    }
}

/// Which transport is carrying records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Local serial link
    Serial,
    /// Server-push event stream
    Stream,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Stream => write!(f, "stream"),
        }
    }
}

/// Lifecycle phase of the active transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No transport active
    #[default]
    Idle,
    /// A transport is being opened
    Connecting,
    /// Records are flowing
    Connected,
    /// The stream transport lost its connection and is retrying
    Reconnecting,
    /// The transport reached end-of-data and was released
    Closed,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionPhase::Idle => write!(f, "Idle"),
            ConnectionPhase::Connecting => write!(f, "Connecting..."),
            ConnectionPhase::Connected => write!(f, "Connected"),
            ConnectionPhase::Reconnecting => write!(f, "Reconnecting..."),
            ConnectionPhase::Closed => write!(f, "Closed"),
        }
    }
}

/// Counters describing the health of the ingestion pipeline.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Complete lines handed to the parser
    pub lines_seen: u64,
    /// Lines that parsed into samples
    pub samples_parsed: u64,
    /// Lines rejected as unrecognized (boot noise, corruption)
    pub parse_rejects: u64,
    /// Mid-session transport read failures
    pub read_errors: u64,
    /// Stream reconnection attempts observed
    pub reconnects: u64,
    /// Messages dropped due to queue backpressure
    pub dropped_messages: u64,
}

impl IngestStats {
    /// Fraction of seen lines that parsed, as a percentage.
    pub fn parse_rate(&self) -> f64 {
        if self.lines_seen == 0 {
            100.0
        } else {
            (self.samples_parsed as f64 / self.lines_seen as f64) * 100.0
        }
    }
}
