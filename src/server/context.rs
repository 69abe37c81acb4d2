// src/server/context.rs

use crate::config::Config;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the process's main loop.
pub struct ServerContext {
    pub config: Config,
    /// Taken by the spawner when the liveness server starts.
    pub listener: Option<TcpListener>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}
