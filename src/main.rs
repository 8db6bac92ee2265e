//! Pong sync host
//!
//! Accepts two guests, assigns them slots 1 and 2 and relays their paddle
//! state to both every tick until they leave or the process is signalled.

use std::sync::Arc;
use std::time::Duration;

use pong_duel::config::Config;
use pong_duel::net::Host;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);

    info!("Starting pong sync host");
    info!(
        port = config.net.port,
        sync_rate = config.net.sync_rate,
        buffer_size = config.net.buffer_size,
        "Transport settings"
    );

    let host = Host::start(Arc::new(config.net.clone())).await?;
    info!("Guests connect to {}", host.local_addr());

    tokio::select! {
        _ = report_status(&host) => {
            info!("Session finished");
        }
        _ = shutdown_signal() => {}
    }

    host.stop();
    info!("Sync host shutdown complete");
    Ok(())
}

/// Log the connected guest count whenever it changes; returns once the host
/// has stopped on its own
async fn report_status(host: &Host) {
    let mut ticker = interval(STATUS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = usize::MAX;

    while host.is_running() {
        ticker.tick().await;
        let connected = host.connected_count();
        if connected != last {
            info!(connected, "Connected guests");
            last = connected;
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
