// src/server/main_loop.rs

//! Waits for a termination signal or a background task failure, then shuts the
//! relay down gracefully.

use super::context::ServerContext;
use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

/// How long background tasks get to finish after the shutdown broadcast.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Why the main loop stopped.
enum StopReason {
    Signal(&'static str),
    TaskFailed(anyhow::Error),
}

pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let reason = wait_for_stop(&mut ctx).await?;

    match &reason {
        StopReason::Signal(name) => info!("{name} received, initiating graceful shutdown."),
        StopReason::TaskFailed(e) => error!("CRITICAL: {e:#}. Shutting down."),
    }

    if ctx.shutdown_tx.send(()).is_err() {
        warn!("No task is listening for the shutdown signal.");
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(res) = ctx.background_tasks.join_next().await {
            if let Ok(Err(e)) = res {
                warn!("Background task exited with an error during shutdown: {e:#}");
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            "Background tasks did not finish within {:?}, aborting them.",
            SHUTDOWN_GRACE
        );
        ctx.background_tasks.shutdown().await;
    }
    info!("Relay shutdown complete.");

    match reason {
        StopReason::Signal(_) => Ok(()),
        StopReason::TaskFailed(e) => Err(e),
    }
}

async fn wait_for_stop(ctx: &mut ServerContext) -> Result<StopReason> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => return Ok(StopReason::Signal("SIGINT")),
            _ = sigterm.recv() => return Ok(StopReason::Signal("SIGTERM")),

            Some(res) = ctx.background_tasks.join_next() => match res {
                // The supervisor and the liveness server only return on shutdown.
                Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                Ok(Err(e)) => return Ok(StopReason::TaskFailed(e.context("Background task failed"))),
                Err(e) => return Ok(StopReason::TaskFailed(anyhow!("Background task panicked: {e:?}"))),
            },
        }
    }
}
