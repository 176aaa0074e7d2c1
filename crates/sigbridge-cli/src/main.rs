//! `sigbridge` – vehicle signal bridge daemon.
//!
//! This binary wires the whole stack together:
//!
//! 1. Initialises structured logging: console or JSON, with optional OTLP
//!    export (see [`sigbridge_runtime::telemetry`]).
//! 2. Loads `~/.sigbridge/config.toml`, falling back to a default
//!    single-signal setup (`Speed` ← `Vehicle.Speed`) when absent.
//! 3. Starts the in-process bus, the simulated data broker, the WebSocket
//!    gateway for external pub/sub clients, and the two bridge components.
//! 4. Intercepts **Ctrl-C / SIGTERM** for a graceful shutdown: pumps stop
//!    taking new events and in-flight publishes finish.

mod config;

use std::sync::Arc;

use sigbridge_datapoint::SimDataPointSource;
use sigbridge_middleware::{MessageBus, WsGateway};
use sigbridge_runtime::{Supervisor, shutdown_channel, telemetry};
use sigbridge_types::SignalValue;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let _telemetry = telemetry::init_tracing("sigbridge");

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => info!(
                    path = %config::config_path().display(),
                    "no config file found, wrote defaults"
                ),
                Err(e) => warn!(error = %e, "no config file found and defaults not writable"),
            }
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config unreadable, using defaults");
            config::Config::default()
        }
    };

    let bindings = match cfg.binding_table() {
        Ok(table) => Arc::new(table),
        Err(e) => {
            error!(error = %e, "invalid signal bindings");
            std::process::exit(1);
        }
    };
    for binding in bindings.iter() {
        info!(
            signal = %binding.signal_id,
            path = %binding.datapoint_path,
            request_topic = %binding.request_topic,
            "signal bound"
        );
    }

    // ── Bus and data broker ───────────────────────────────────────────────
    let bus = Arc::new(MessageBus::new(cfg.bus_capacity));

    // Simulated broker with every bound signal starting at zero. A
    // deployment swaps in a real data-broker client behind the same trait.
    let mut source = SimDataPointSource::new();
    for binding in bindings.iter() {
        source = source.with_signal(&binding.datapoint_path, SignalValue::Float(0.0));
    }
    let source = Arc::new(source);

    // ── Shutdown handling ─────────────────────────────────────────────────
    // `shutdown_tx` must outlive the whole run: if the sender drops, the
    // pumps read it as an immediate shutdown.
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let ctrlc_tx = shutdown_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("termination signal received, shutting down");
        let _ = ctrlc_tx.send(true);
    }) {
        warn!(error = %e, "failed to install signal handler; graceful shutdown unavailable");
    }

    // ── WebSocket gateway ─────────────────────────────────────────────────
    let gateway = WsGateway::new(Arc::clone(&bus)).with_port(cfg.gateway_port);
    info!(port = gateway.port(), "websocket gateway listening");
    let gateway_task = tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            error!(error = %e, "websocket gateway failed");
        }
    });

    // ── Run until shutdown ────────────────────────────────────────────────
    let supervisor = Supervisor::new(bus, source, bindings, shutdown_rx);
    if let Err(e) = supervisor.run().await {
        error!(error = %e, "supervisor failed");
        std::process::exit(1);
    }

    gateway_task.abort();
    info!("sigbridge exited");
}
