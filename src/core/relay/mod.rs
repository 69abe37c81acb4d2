// src/core/relay/mod.rs

//! The upstream side of the relay: connection supervision, the session state
//! machine, keepalive, and the WebSocket transport.
//!
//! The [`RelaySupervisor`] is the only long-lived owner of connection identity. It
//! opens a connection, runs it until the transport ends for any reason, waits a fixed
//! delay, and starts over. There is no retry limit: an upstream outage is retried for
//! as long as the process runs.

pub mod connection;
pub mod keepalive;
pub mod session;
pub mod transport;

pub use connection::{FrameSender, SessionSettings, run_connection};
pub use keepalive::KeepaliveDriver;
pub use session::{Session, SessionAction, SessionState, SessionWatch};
pub use transport::{FrameSink, FrameStream, Transport, UpstreamHeaders, WsTransport};

use crate::core::RelayError;
use crate::core::metrics;
use crate::core::notify::Notifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{info, warn};

pub struct RelaySupervisor {
    transport: Arc<dyn Transport>,
    settings: SessionSettings,
    notifier: Notifier,
    reconnect_delay: Duration,
}

impl RelaySupervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: SessionSettings,
        notifier: Notifier,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            transport,
            settings,
            notifier,
            reconnect_delay,
        }
    }

    /// Runs the reconnect loop until a shutdown signal is received.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Relay supervisor started (reconnect delay {:?}, keepalive interval {:?}).",
            self.reconnect_delay, self.settings.ping_interval
        );
        let mut connection_id: u64 = 0;

        loop {
            connection_id = connection_id.wrapping_add(1);
            metrics::CONNECTION_ATTEMPTS_TOTAL.inc();
            info!("Connecting to upstream (connection #{})...", connection_id);

            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Relay supervisor shutting down.");
                    return;
                }
                res = self.run_once(connection_id) => match res {
                    Ok(()) => info!(
                        "Connection #{} closed. Reconnecting in {:?}...",
                        connection_id, self.reconnect_delay
                    ),
                    Err(e) if e.is_connection_fatal() => warn!(
                        "Connection #{} lost: {}. Reconnecting in {:?}...",
                        connection_id, e, self.reconnect_delay
                    ),
                    Err(e) => warn!(
                        "Connection #{} terminated unexpectedly: {}. Reconnecting in {:?}...",
                        connection_id, e, self.reconnect_delay
                    ),
                }
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Relay supervisor shutting down.");
                    return;
                }
                _ = time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// Opens one connection and runs it to completion.
    async fn run_once(&self, connection_id: u64) -> Result<(), RelayError> {
        let (sink, stream) = self.transport.connect().await?;
        info!("Connection #{}: WebSocket connected.", connection_id);
        run_connection(connection_id, sink, stream, &self.settings, &self.notifier).await
    }
}
