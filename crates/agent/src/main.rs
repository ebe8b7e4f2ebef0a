// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! corrald: the corral host agent.
//!
//! Wires the reconciliation engine to this host: a Docker-backed
//! container handler, the host-state and action listeners, and the
//! manage loops that keep them connected to the coordination service.

mod adapters;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use corral_coord::{Connect, MemoryCoordinator};
use corral_core::SystemClock;
use corral_engine::{manage, ActionListener, HostStateListener};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adapters::DockerHandler;
use config::{Config, ConfigError};

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("corrald: {}", err);
            std::process::exit(2);
        }
    };

    init_tracing(&config.log_filter);

    if let Err(err) = run(config).await {
        eprintln!("corrald: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: Config) -> Result<(), ConfigError> {
    let connector: Arc<dyn Connect> = match config.coordinator.as_str() {
        "standalone" => {
            warn!("standalone coordinator keeps state in process; a restart forgets assignments");
            Arc::new(MemoryCoordinator::new())
        }
        other => return Err(ConfigError::UnknownCoordinator(other.to_string())),
    };

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let handler = Arc::new(DockerHandler::new(config.docker.clone(), SystemClock));
    let host_listener =
        Arc::new(HostStateListener::new(config.host_id.as_str(), handler.clone(), SystemClock));
    let action_listener = Arc::new(ActionListener::new(config.host_id.as_str(), handler));

    info!(host_id = %config.host_id, "corral agent starting");
    tokio::join!(
        manage(shutdown.clone(), connector.clone(), host_listener),
        manage(shutdown.clone(), connector, action_listener),
    );
    info!("corral agent stopped");
    Ok(())
}

/// SIGINT/SIGTERM broadcast the shutdown token; supervisors detach and
/// the manage loops drain before the process exits.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "could not install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
