// src/core/relay/keepalive.rs

use super::connection::FrameSender;
use super::session::SessionWatch;
use crate::core::RelayError;
use crate::core::metrics;
use crate::core::protocol::HEARTBEAT_TOKEN;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Sends periodic heartbeat frames for one joined connection.
///
/// Started by the connection driver once the namespace join is acknowledged, and
/// never restarted for the same connection. It stops as soon as the session leaves
/// the `Joined` state. A failed send is reported on `fault_tx` so the receive loop
/// can close the connection.
pub struct KeepaliveDriver {
    connection_id: u64,
    sender: FrameSender,
    session: SessionWatch,
    interval: Duration,
    fault_tx: mpsc::Sender<RelayError>,
}

impl KeepaliveDriver {
    pub fn new(
        connection_id: u64,
        sender: FrameSender,
        session: SessionWatch,
        interval: Duration,
        fault_tx: mpsc::Sender<RelayError>,
    ) -> Self {
        Self {
            connection_id,
            sender,
            session,
            interval,
            fault_tx,
        }
    }

    /// Runs the main loop for the keepalive driver.
    pub async fn run(mut self) {
        debug!(
            "Connection #{}: keepalive driver started with interval {:?}.",
            self.connection_id, self.interval
        );
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.session.closed() => {
                    debug!("Connection #{}: keepalive driver stopped, connection closed.", self.connection_id);
                    return;
                }
                _ = ticker.tick() => {
                    if !self.session.is_keepalive_eligible() {
                        debug!(
                            "Connection #{}: keepalive driver stopped, session is {}.",
                            self.connection_id,
                            self.session.state()
                        );
                        return;
                    }
                    match self.sender.send(HEARTBEAT_TOKEN).await {
                        Ok(()) => {
                            metrics::KEEPALIVES_SENT_TOTAL.inc();
                            debug!("Connection #{}: keepalive sent.", self.connection_id);
                        }
                        Err(e) => {
                            warn!("Connection #{}: failed to send keepalive: {}", self.connection_id, e);
                            let _ = self.fault_tx.try_send(e);
                            return;
                        }
                    }
                }
            }
        }
    }
}
