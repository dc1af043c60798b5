//! `cardbridge` binary: relays an ACR1555U BLE card reader to a remote peer.

mod bridge;
mod config;

use std::process::ExitCode;

use cardbridge_core::CancelScope;
use cardbridge_core::constants::{BROKER_URL_ENV, EXIT_FAILURE, EXIT_OK, EXIT_USAGE};
use cardbridge_network::BrokerUrl;
use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bridge::BridgeConfig;
use crate::config::{Args, BUILD_DEFAULT_BROKER_URL, Backend, resolve_broker_url};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let Some(url) = resolve_broker_url(args.broker_url.as_deref(), BUILD_DEFAULT_BROKER_URL) else {
        error!("Relay broker URL is required, pass --broker-url or set {BROKER_URL_ENV}");
        let _ = Args::command().print_help();
        return ExitCode::from(EXIT_USAGE);
    };

    let broker = match BrokerUrl::parse(&url) {
        Ok(broker) => broker,
        Err(e) => {
            error!(error = %e, "Invalid relay broker URL");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let config = BridgeConfig::new(args.name.clone(), args.sam, broker, Backend::from_args(&args));
    let scope = CancelScope::new();
    tokio::spawn(cancel_on_signal(scope.clone()));

    match bridge::run(&config, &scope).await {
        Ok(()) => {
            info!("Shut down cleanly");
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(unix)]
async fn cancel_on_signal(scope: CancelScope) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM");
            if tokio::signal::ctrl_c().await.is_ok() {
                scope.cancel_with_cause("received SIGINT");
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                scope.cancel_with_cause("received SIGINT");
            }
        }
        _ = terminate.recv() => scope.cancel_with_cause("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn cancel_on_signal(scope: CancelScope) {
    if tokio::signal::ctrl_c().await.is_ok() {
        scope.cancel_with_cause("received SIGINT");
    }
}
