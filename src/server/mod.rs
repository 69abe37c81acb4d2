// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod context;
mod health_server;
mod initialization;
mod main_loop;
mod spawner;

pub use health_server::run_health_server;

/// The main startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Bind the liveness listener and create the shutdown channel.
    let mut server_context = initialization::setup(config).await?;

    // 2. Spawn the relay supervisor and the liveness server.
    spawner::spawn_all(&mut server_context)?;

    // 3. Wait for a shutdown signal or a task failure.
    main_loop::run(server_context).await
}
