//! Firewatch console - Main Entry Point
//!
//! A headless presentation adapter for the ingestion backend: it picks a
//! transport, subscribes to the backend's message surface, and renders
//! samples through structured logging.

use clap::Parser;
use firewatch_rs::backend::{TelemetryBackend, TelemetryMessage};
use firewatch_rs::config::{AppConfig, ConsoleState};
use firewatch_rs::transport;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "firewatch",
    version,
    about = "Live telemetry console for an embedded gas/flame sensor node"
)]
struct Cli {
    /// Path to firewatch.toml (defaults to the platform data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connect over serial on this port
    #[arg(long, conflicts_with = "url")]
    port: Option<String>,

    /// Connect to this event-stream URL
    #[arg(long)]
    url: Option<String>,

    /// List detected serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref());
    config.apply_env_overrides();

    // Initialize logging; the worker narrates connection lifecycle and
    // event-log entries itself, so the subscriber is the console surface.
    let registry = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,firewatch_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer());

    let _file_guard;
    if let Some(dir) = &config.log.directory {
        let appender = tracing_appender::rolling::daily(dir, &config.log.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init();
    } else {
        _file_guard = None;
        registry.init();
    }

    if cli.list_ports {
        let ports = transport::available_ports();
        if ports.is_empty() {
            println!("no serial ports detected");
        } else {
            for port in ports {
                println!("{port}");
            }
        }
        return Ok(());
    }

    tracing::info!("Starting Firewatch console");

    let mut state = ConsoleState::load_or_default();

    let (backend, dashboard) = TelemetryBackend::new(config.clone());
    let worker = std::thread::spawn(move || backend.run());

    // Pick the startup transport. An explicit port or URL wins; otherwise
    // the event stream auto-connects when configured, the way the
    // dashboard auto-connects when it is served from the node itself.
    if let Some(port) = cli.port {
        state.last_port = Some(port.clone());
        dashboard.connect_serial(Some(port));
    } else if let Some(url) = cli.url {
        state.last_stream_url = Some(url.clone());
        dashboard.connect_stream(Some(url));
    } else if config.stream.auto_connect {
        state.last_stream_url = Some(config.stream.url.clone());
        dashboard.connect_stream(None);
    } else {
        let port = config.serial.port.clone().or_else(|| state.last_port.clone());
        if port.is_some() {
            state.last_port = port.clone();
        }
        dashboard.connect_serial(port);
    }

    if let Err(e) = state.save() {
        tracing::warn!("Failed to save console state: {}", e);
    }

    // Render until the worker goes away.
    loop {
        match dashboard.receiver.recv() {
            Ok(TelemetryMessage::Shutdown) | Err(_) => break,
            Ok(msg) => render(&msg),
        }
    }

    worker
        .join()
        .map_err(|_| anyhow::anyhow!("telemetry worker panicked"))?;
    Ok(())
}

fn render(message: &TelemetryMessage) {
    match message {
        TelemetryMessage::Sample(facts) => {
            let sample = &facts.sample;
            if facts.state_changed {
                tracing::warn!(state = %sample.state, "system state changed");
            }
            tracing::info!(
                gas = sample.gas,
                zscore = sample.z_score,
                risk = sample.risk,
                state = %sample.state,
                gas_level = %facts.gas_level,
                trend = %facts.trend,
                flame = if sample.flame { "FIRE DETECTED" } else { "clear" },
                persistence = %facts.flame_persist,
                "sample"
            );
        }
        TelemetryMessage::UnsupportedEnvironment(notice) => {
            tracing::error!("{notice}");
        }
        TelemetryMessage::Stats(stats) => {
            tracing::debug!(
                lines = stats.lines_seen,
                parsed = stats.samples_parsed,
                rejected = stats.parse_rejects,
                dropped = stats.dropped_messages,
                "ingest stats"
            );
        }
        // Phase changes, log events and transport errors are narrated by
        // the worker's own logging.
        _ => {}
    }
}
