// src/server/initialization.rs

//! Prepares everything the relay needs before its tasks are spawned.

use super::context::ServerContext;
use crate::config::Config;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Binds the liveness listener and creates the shutdown channel.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind liveness server on {}:{}",
                config.host, config.port
            )
        })?;
    info!(
        "Liveness server listening on http://{}:{}",
        config.host, config.port
    );

    Ok(ServerContext {
        config,
        listener: Some(listener),
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Upstream: {} (namespace {}, keepalive every {:?}).",
        config.upstream.url, config.upstream.namespace, config.upstream.ping_interval
    );
    info!(
        "Delivering alerts to chat {} with up to {} attempts, {:?} apart.",
        config.telegram.group_id, config.telegram.retries, config.telegram.retry_delay
    );
    if config.upstream.reconnect_delay.is_zero() {
        warn!("reconnect_delay is 0. An unreachable upstream will be retried in a tight loop.");
    }
}
