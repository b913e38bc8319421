//! Record parsing with layout fallback
//!
//! The node's record is a comma-separated `Key:value` line:
//!
//! ```text
//! Gas:412.00,ZScore:0.53,Trend:1.20,Risk:12.5,Flame:0,FlamePersist:0,State:SAFE
//! ```
//!
//! Older firmware revisions omit `FlamePersist`, and the oldest also omits
//! `Trend`; which optional fields are present is the only difference
//! between protocol versions, so the widest layout is tried first and
//! field presence decides the version. Value shapes are strict (an
//! unsigned float is digits and dots only, `Flame` is exactly `0` or `1`),
//! but the record may sit anywhere in the line and anything after `State`
//! is ignored, tolerating prefix noise and future trailing fields.

use crate::types::{Sample, SystemState};

const KEYS_FULL: &[&str] = &["Gas", "ZScore", "Trend", "Risk", "Flame", "FlamePersist", "State"];
const KEYS_NO_PERSIST: &[&str] = &["Gas", "ZScore", "Trend", "Risk", "Flame", "State"];
const KEYS_BASE: &[&str] = &["Gas", "ZScore", "Risk", "Flame", "State"];

/// Recognized record layouts, widest first.
const LAYOUTS: &[&[&str]] = &[KEYS_FULL, KEYS_NO_PERSIST, KEYS_BASE];

/// Parse one line into a sample, or reject it.
///
/// Rejection is silent by design: the serial line carries boot banners and
/// baseline-learning progress interleaved with records, and those lines are
/// simply not data. Callers that want to count drops can do so themselves.
pub fn parse_record(line: &str) -> Option<Sample> {
    for layout in LAYOUTS {
        for (idx, _) in line.match_indices("Gas:") {
            if let Some(sample) = match_layout(&line[idx..], layout) {
                return Some(sample);
            }
        }
    }
    None
}

/// Try to read `text` as a record with exactly the given key order.
fn match_layout(text: &str, layout: &[&str]) -> Option<Sample> {
    let mut fields = text.split(',');

    let mut gas = None;
    let mut z_score = None;
    let mut trend = None;
    let mut risk = None;
    let mut flame = None;
    let mut flame_persist = None;
    let mut state = None;

    for key in layout {
        let field = fields.next()?;
        let value = field.strip_prefix(key)?.strip_prefix(':')?;
        match *key {
            "Gas" => gas = Some(unsigned_float(value)?),
            "ZScore" => z_score = Some(signed_float(value)?),
            "Trend" => trend = Some(signed_float(value)?),
            "Risk" => risk = Some(unsigned_float(value)?),
            "Flame" => flame = Some(flame_flag(value)?),
            "FlamePersist" => flame_persist = Some(unsigned_int(value)?),
            "State" => state = Some(state_word(value)?),
            _ => unreachable!("unknown layout key"),
        }
    }
    // Fields after State are tolerated.

    Some(Sample {
        gas: gas?,
        z_score: z_score?,
        trend,
        risk: risk?,
        flame: flame?,
        flame_persist,
        state: state?,
    })
}

/// Digits and dots only, then standard decimal parsing. A value that fits
/// the shape but fails parsing (`1.2.3`) rejects the record rather than
/// producing a poisoned number.
fn unsigned_float(value: &str) -> Option<f64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    value.parse().ok()
}

/// Like [`unsigned_float`] but the minus sign is allowed.
fn signed_float(value: &str) -> Option<f64> {
    if value.is_empty()
        || !value
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return None;
    }
    value.parse().ok()
}

/// `1` means fire detected. The firmware encodes the flame sensor pulled
/// low as `1`; the literal mapping is preserved, not re-derived.
fn flame_flag(value: &str) -> Option<bool> {
    match value {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn unsigned_int(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// The leading run of word characters; anything after it is ignored.
fn state_word(value: &str) -> Option<SystemState> {
    let end = value
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'_'))
        .unwrap_or(value.len());
    if end == 0 {
        return None;
    }
    Some(SystemState::from_word(&value[..end]))
}
