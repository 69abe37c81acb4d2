// src/server/spawner.rs

//! Builds the relay components from the configuration and spawns the
//! long-running tasks.

use super::context::ServerContext;
use super::health_server;
use crate::config::Config;
use crate::core::notify::{Notifier, RetryPolicy, TelegramClient};
use crate::core::protocol::Namespace;
use crate::core::relay::{RelaySupervisor, SessionSettings, WsTransport};
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;

/// Wires the transport, session settings and notifier into a supervisor.
pub fn build_supervisor(config: &Config) -> Result<RelaySupervisor> {
    let upstream = &config.upstream;
    let transport = WsTransport::new(
        upstream.url.clone(),
        &upstream.headers,
        upstream.connect_timeout,
    )
    .context("Failed to prepare the upstream transport")?;

    let telegram = &config.telegram;
    let client = TelegramClient::new(
        &telegram.api_base,
        &telegram.bot_token,
        telegram.group_id.clone(),
        &telegram.buttons,
        telegram.timeout,
    )
    .context("Failed to build the Telegram client")?;
    let notifier = Notifier::new(
        Arc::new(client),
        RetryPolicy {
            attempts: telegram.retries,
            delay: telegram.retry_delay,
        },
    )
    .with_footer(telegram.footer.clone());

    let settings = SessionSettings {
        namespace: Namespace::new(&upstream.namespace),
        auth_message: upstream.auth_message.clone(),
        handshake_delay: upstream.handshake_delay,
        ping_interval: upstream.ping_interval,
    };

    Ok(RelaySupervisor::new(
        Arc::new(transport),
        settings,
        notifier,
        upstream.reconnect_delay,
    ))
}

/// Spawns all critical background tasks into the context's JoinSet.
pub fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let supervisor = build_supervisor(&ctx.config)?;

    // --- Upstream Relay ---
    let shutdown_rx_relay = ctx.shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        supervisor.run(shutdown_rx_relay).await;
        Ok(())
    });

    // --- Liveness Server ---
    let listener = ctx
        .listener
        .take()
        .ok_or_else(|| anyhow!("Liveness listener was already taken"))?;
    let shutdown_rx_health = ctx.shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        health_server::run_health_server(listener, shutdown_rx_health)
            .await
            .map_err(|e| anyhow!("Liveness server failed: {}", e))
    });

    Ok(())
}
