//! Rolling aggregation of parsed samples
//!
//! The aggregator is the single owner of everything remembered between
//! samples: the last declared state, the bounded chart series, and the
//! bounded event log. [`Aggregator::ingest`] turns each sample into
//! [`DisplayFacts`] - the classifications and the state-change flag a
//! presentation layer renders directly - while rolling the chart window
//! forward.
//!
//! Aggregation state deliberately survives transport reconnects: the chart
//! and last-seen state carry across a brief disconnect so the display does
//! not blank out.

use crate::types::{
    ChartPoint, DisplayFacts, EventLog, FlamePersistClass, GasLevelClass, LogEvent, RollingSeries,
    Sample, SystemState, TrendClass,
};
use chrono::Utc;

/// Divisor that brings the raw gas reading into the chart's 0-100 range
pub const GAS_CHART_DIVISOR: f64 = 40.0;

/// Gain applied to the trend before plotting; negatives are floored at zero
pub const TREND_CHART_GAIN: f64 = 2.0;

/// Consumes ordered samples and maintains display-ready rolling state.
#[derive(Debug)]
pub struct Aggregator {
    last_state: Option<SystemState>,
    series: RollingSeries,
    events: EventLog,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(crate::types::CHART_WINDOW)
    }
}

impl Aggregator {
    /// Create an aggregator whose chart retains `chart_window` points.
    pub fn new(chart_window: usize) -> Self {
        Self {
            last_state: None,
            series: RollingSeries::new(chart_window),
            events: EventLog::default(),
        }
    }

    /// Ingest one sample: classify it, detect a state change, and push a
    /// chart point.
    ///
    /// `state_changed` is only raised once a previous state exists; the
    /// very first sample establishes the baseline without flagging a
    /// change. The remembered state is updated unconditionally.
    pub fn ingest(&mut self, sample: Sample) -> DisplayFacts {
        let state_changed = self
            .last_state
            .as_ref()
            .is_some_and(|prev| *prev != sample.state);
        if state_changed {
            tracing::debug!(state = %sample.state, "system state changed");
        }
        self.last_state = Some(sample.state.clone());

        let chart_point = ChartPoint {
            timestamp: Utc::now(),
            risk: sample.risk,
            gas_scaled: sample.gas / GAS_CHART_DIVISOR,
            trend_scaled: (sample.trend.unwrap_or(0.0) * TREND_CHART_GAIN).max(0.0),
        };
        self.series.push(chart_point.clone());

        DisplayFacts {
            state_changed,
            trend: TrendClass::classify(sample.trend),
            gas_level: GasLevelClass::classify(sample.gas),
            flame_persist: FlamePersistClass::classify(sample.flame_persist),
            chart_point,
            sample,
        }
    }

    /// Record a message in the bounded event log and return the entry.
    pub fn record_event(&mut self, message: impl Into<String>) -> LogEvent {
        self.events.record(message)
    }

    /// The rolling chart series, oldest point first.
    pub fn series(&self) -> &RollingSeries {
        &self.series
    }

    /// The bounded event log, oldest entry first.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The most recently ingested declared state, if any.
    pub fn last_state(&self) -> Option<&SystemState> {
        self.last_state.as_ref()
    }
}
