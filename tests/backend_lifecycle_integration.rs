//! Integration tests for backend lifecycle
//!
//! These tests validate the complete backend workflow with scripted
//! transports:
//! - Connection, reconnection and disconnection
//! - Sample flow from raw chunks and framed records
//! - Transport switching and shutdown

mod common;

#[cfg(feature = "mock-transport")]
use common::{base_record, contains_sample, full_record, wait_for};
#[cfg(feature = "mock-transport")]
use firewatch_rs::backend::{TelemetryBackend, TelemetryMessage};
#[cfg(feature = "mock-transport")]
use firewatch_rs::config::AppConfig;
#[cfg(feature = "mock-transport")]
use firewatch_rs::transport::MockScript;
#[cfg(feature = "mock-transport")]
use firewatch_rs::types::ConnectionPhase;
#[cfg(feature = "mock-transport")]
use std::thread;
#[cfg(feature = "mock-transport")]
use std::time::Duration;

#[cfg(feature = "mock-transport")]
const WAIT: Duration = Duration::from_secs(2);

#[test]
#[cfg(feature = "mock-transport")]
fn test_backend_creation_and_shutdown() {
    let config = AppConfig::default();
    let (backend, dashboard) = TelemetryBackend::new(config);

    let handle = thread::spawn(move || backend.run());

    thread::sleep(Duration::from_millis(50));
    dashboard.shutdown();

    let result = handle.join();
    assert!(result.is_ok(), "Backend thread should exit cleanly");
}

#[test]
#[cfg(feature = "mock-transport")]
fn test_stream_records_flow_as_samples() {
    let (backend, dashboard) = TelemetryBackend::new(AppConfig::default());
    let handle = thread::spawn(move || backend.run());

    let script = MockScript::stream()
        .record(base_record(410.0, 1.0, "SAFE"))
        .record(full_record(900.0, 3.0, 40.0, false, 0, "WARNING"));
    dashboard.connect_mock(script);

    let mut samples = Vec::new();
    let messages = wait_for(&dashboard, WAIT, |msg| {
        if let TelemetryMessage::Sample(facts) = msg {
            samples.push(facts.as_ref().clone());
        }
        samples.len() == 2
    });

    assert_eq!(samples.len(), 2, "expected two samples, saw {messages:?}");
    assert!(!samples[0].state_changed);
    assert!(samples[1].state_changed);

    // The stream announces itself before records arrive.
    let phases: Vec<ConnectionPhase> = messages
        .iter()
        .filter_map(|m| match m {
            TelemetryMessage::Phase(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![ConnectionPhase::Connecting, ConnectionPhase::Connected]
    );

    dashboard.shutdown();
    handle.join().unwrap();
}

#[test]
#[cfg(feature = "mock-transport")]
fn test_serial_chunks_are_framed() {
    let (backend, dashboard) = TelemetryBackend::new(AppConfig::default());
    let handle = thread::spawn(move || backend.run());

    // One record split awkwardly across reads, with trailing noise.
    let record = base_record(1200.0, 2.5, "SAFE");
    let (head, tail) = record.split_at(17);
    let script = MockScript::serial()
        .chunk(head)
        .idle()
        .chunk(format!("{tail}\nLearning Base"))
        .chunk("line... 410.55\n");
    dashboard.connect_mock(script);

    let messages = wait_for(&dashboard, WAIT, |msg| {
        matches!(msg, TelemetryMessage::Sample(_))
    });
    assert!(contains_sample(&messages));

    if let Some(TelemetryMessage::Sample(facts)) = messages.last() {
        assert_eq!(facts.sample.gas, 1200.0);
    } else {
        panic!("last message should be the sample");
    }

    dashboard.shutdown();
    handle.join().unwrap();
}

#[test]
#[cfg(feature = "mock-transport")]
fn test_switching_transports_keeps_aggregation_state() {
    let (backend, dashboard) = TelemetryBackend::new(AppConfig::default());
    let handle = thread::spawn(move || backend.run());

    dashboard.connect_mock(MockScript::stream().record(base_record(400.0, 1.0, "SAFE")));
    let first = wait_for(&dashboard, WAIT, |msg| {
        matches!(msg, TelemetryMessage::Sample(_))
    });
    assert!(contains_sample(&first));

    // Switch to a serial script. The prior transport is closed first and
    // the aggregator remembers the SAFE state across the switch.
    dashboard.connect_mock(
        MockScript::serial().chunk(base_record(420.0, 90.0, "EMERGENCY") + "\n"),
    );

    let mut changed = None;
    wait_for(&dashboard, WAIT, |msg| {
        if let TelemetryMessage::Sample(facts) = msg {
            changed = Some(facts.state_changed);
            true
        } else {
            false
        }
    });
    assert_eq!(
        changed,
        Some(true),
        "the EMERGENCY sample should register as a change from SAFE"
    );

    dashboard.shutdown();
    handle.join().unwrap();
}

#[test]
#[cfg(feature = "mock-transport")]
fn test_failed_open_reports_error_and_idles() {
    let (backend, dashboard) = TelemetryBackend::new(AppConfig::default());
    let handle = thread::spawn(move || backend.run());

    dashboard.connect_mock(MockScript::serial().fail_open());

    let messages = wait_for(&dashboard, WAIT, |msg| {
        matches!(msg, TelemetryMessage::Phase(ConnectionPhase::Idle))
    });

    assert!(messages
        .iter()
        .any(|m| matches!(m, TelemetryMessage::TransportError(_))));
    assert!(matches!(
        messages.last(),
        Some(TelemetryMessage::Phase(ConnectionPhase::Idle))
    ));

    // The system stays retriable: a later connect still works.
    dashboard.connect_mock(MockScript::stream().record(base_record(400.0, 1.0, "SAFE")));
    let retried = wait_for(&dashboard, WAIT, |msg| {
        matches!(msg, TelemetryMessage::Sample(_))
    });
    assert!(contains_sample(&retried));

    dashboard.shutdown();
    handle.join().unwrap();
}

#[test]
#[cfg(feature = "mock-transport")]
fn test_stream_outage_cycles_reconnecting() {
    let (backend, dashboard) = TelemetryBackend::new(AppConfig::default());
    let handle = thread::spawn(move || backend.run());

    // A recovered stream re-announces itself before records resume.
    let script = MockScript::stream()
        .record(base_record(400.0, 1.0, "SAFE"))
        .reconnecting()
        .reconnecting()
        .opened()
        .record(base_record(405.0, 1.5, "SAFE"));
    dashboard.connect_mock(script);

    let mut samples = 0;
    let messages = wait_for(&dashboard, WAIT, |msg| {
        if matches!(msg, TelemetryMessage::Sample(_)) {
            samples += 1;
        }
        samples == 2
    });

    let phases: Vec<ConnectionPhase> = messages
        .iter()
        .filter_map(|m| match m {
            TelemetryMessage::Phase(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            ConnectionPhase::Connecting,
            ConnectionPhase::Connected,
            ConnectionPhase::Reconnecting,
            ConnectionPhase::Connected
        ]
    );

    dashboard.shutdown();
    handle.join().unwrap();
}

#[test]
#[cfg(feature = "mock-transport")]
fn test_disconnect_releases_but_keeps_history() {
    let (backend, dashboard) = TelemetryBackend::new(AppConfig::default());
    let handle = thread::spawn(move || backend.run());

    dashboard.connect_mock(MockScript::stream().record(base_record(400.0, 1.0, "WARNING")));
    wait_for(&dashboard, WAIT, |msg| {
        matches!(msg, TelemetryMessage::Sample(_))
    });

    dashboard.disconnect();
    let after = wait_for(&dashboard, WAIT, |msg| {
        matches!(msg, TelemetryMessage::Phase(ConnectionPhase::Idle))
    });
    assert!(matches!(
        after.last(),
        Some(TelemetryMessage::Phase(ConnectionPhase::Idle))
    ));

    // Reconnect: the WARNING state survived the disconnect, so an
    // EMERGENCY record flags a change.
    dashboard.connect_mock(
        MockScript::stream().record(base_record(800.0, 95.0, "EMERGENCY")),
    );
    let mut changed = None;
    wait_for(&dashboard, WAIT, |msg| {
        if let TelemetryMessage::Sample(facts) = msg {
            changed = Some(facts.state_changed);
            true
        } else {
            false
        }
    });
    assert_eq!(changed, Some(true));

    dashboard.shutdown();
    handle.join().unwrap();
}
