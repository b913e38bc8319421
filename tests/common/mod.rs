//! Shared helpers for integration tests

#![allow(dead_code)]

use firewatch_rs::backend::{DashboardHandle, TelemetryMessage};
use std::time::{Duration, Instant};

/// Build a record in the oldest protocol layout.
pub fn base_record(gas: f64, risk: f64, state: &str) -> String {
    format!("Gas:{gas},ZScore:0.50,Risk:{risk},Flame:0,State:{state}")
}

/// Build a record in the newest protocol layout.
pub fn full_record(
    gas: f64,
    trend: f64,
    risk: f64,
    flame: bool,
    persist: u32,
    state: &str,
) -> String {
    format!(
        "Gas:{gas},ZScore:0.50,Trend:{trend},Risk:{risk},Flame:{},FlamePersist:{persist},State:{state}",
        u8::from(flame)
    )
}

/// Receive messages until `pred` matches one or the timeout expires,
/// returning everything seen. The matching message is the last element
/// when the wait succeeded.
pub fn wait_for(
    dashboard: &DashboardHandle,
    timeout: Duration,
    mut pred: impl FnMut(&TelemetryMessage) -> bool,
) -> Vec<TelemetryMessage> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        if let Ok(msg) = dashboard.receiver.recv_timeout(Duration::from_millis(50)) {
            let hit = pred(&msg);
            seen.push(msg);
            if hit {
                return seen;
            }
        }
    }
    seen
}

/// True when any seen message is a sample.
pub fn contains_sample(messages: &[TelemetryMessage]) -> bool {
    messages
        .iter()
        .any(|m| matches!(m, TelemetryMessage::Sample(_)))
}
