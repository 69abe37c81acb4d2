// src/core/relay/connection.rs

//! Drives a single upstream connection from handshake to close.
//!
//! The transport's write half is owned by a dedicated writer task; everything that
//! needs to send (the handshake and the keepalive driver) goes through a
//! [`FrameSender`] and waits for the writer to confirm the frame was written. The
//! read half stays with the receive loop, which feeds frames to the [`Session`]
//! strictly in arrival order.

use super::keepalive::KeepaliveDriver;
use super::session::{Session, SessionAction};
use super::transport::{FrameSink, FrameStream};
use crate::core::RelayError;
use crate::core::metrics;
use crate::core::notify::{Notifier, format_alert};
use crate::core::protocol::Namespace;
use chrono::Local;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Frames waiting for the writer. Only the handshake and keepalive ever queue.
const OUTBOUND_QUEUE: usize = 16;
/// How long the writer may take to flush and close the sink during teardown.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-connection protocol settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub namespace: Namespace,
    /// Sent verbatim after the namespace subscribe frame.
    pub auth_message: String,
    /// Pause between the subscribe frame and the auth frame.
    pub handshake_delay: Duration,
    pub ping_interval: Duration,
}

struct OutboundFrame {
    text: String,
    written: oneshot::Sender<Result<(), RelayError>>,
}

/// A handle for queueing frames on the connection's writer task.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<OutboundFrame>,
}

impl FrameSender {
    /// Queues `text` and waits until the writer has written it to the transport.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), RelayError> {
        let (written, confirmation) = oneshot::channel();
        self.tx
            .send(OutboundFrame {
                text: text.into(),
                written,
            })
            .await
            .map_err(|_| RelayError::SendAfterClose)?;
        confirmation.await.map_err(|_| RelayError::SendAfterClose)?
    }
}

/// Owns the sink. Exits with an error on the first failed write, or cleanly once
/// every `FrameSender` has been dropped.
async fn run_writer(
    mut sink: FrameSink,
    mut rx: mpsc::Receiver<OutboundFrame>,
) -> Result<(), RelayError> {
    while let Some(frame) = rx.recv().await {
        let result = sink
            .send(Message::text(frame.text))
            .await
            .map_err(RelayError::from);
        let failure = result.as_ref().err().cloned();
        let _ = frame.written.send(result);
        if let Some(e) = failure {
            return Err(e);
        }
    }
    let _ = sink.close().await;
    Ok(())
}

/// Waits for the writer to finish, or forever once it has already been joined.
async fn join_writer(
    writer: &mut Option<JoinHandle<Result<(), RelayError>>>,
) -> Result<(), RelayError> {
    let Some(handle) = writer.as_mut() else {
        return std::future::pending().await;
    };
    let result = handle.await;
    *writer = None;
    match result {
        Ok(res) => res,
        Err(e) => Err(RelayError::Internal(format!("writer task failed: {e}"))),
    }
}

/// Subscribes to the namespace, then authenticates.
async fn handshake(
    session: &mut Session,
    sender: &FrameSender,
    settings: &SessionSettings,
) -> Result<(), RelayError> {
    let subscribe = session.begin_handshake()?;
    sender.send(subscribe.as_str()).await?;
    info!(
        "Connection #{}: sent namespace subscribe {}.",
        session.connection_id(),
        subscribe
    );

    if !settings.handshake_delay.is_zero() {
        tokio::time::sleep(settings.handshake_delay).await;
    }
    sender.send(settings.auth_message.as_str()).await?;
    info!("Connection #{}: sent auth message.", session.connection_id());
    Ok(())
}

/// Runs one connection until the transport ends.
///
/// Returns `Ok(())` when the upstream closed the connection cleanly and an error for
/// any other termination. Either way the session is `Closed` on return and its
/// keepalive driver has stopped.
pub async fn run_connection(
    connection_id: u64,
    sink: FrameSink,
    mut stream: FrameStream,
    settings: &SessionSettings,
    notifier: &Notifier,
) -> Result<(), RelayError> {
    let mut session = Session::new(connection_id, settings.namespace.clone());
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let sender = FrameSender { tx: out_tx };
    let mut writer = Some(tokio::spawn(run_writer(sink, out_rx)));
    let (fault_tx, mut fault_rx) = mpsc::channel::<RelayError>(1);
    let mut keepalive: Option<JoinHandle<()>> = None;

    let result = async {
        handshake(&mut session, &sender, settings).await?;

        loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::FRAMES_RECEIVED_TOTAL.inc();
                        match session.handle_frame(text.as_str(), Local::now()) {
                            SessionAction::None => {}
                            SessionAction::StartKeepalive => {
                                let driver = KeepaliveDriver::new(
                                    connection_id,
                                    sender.clone(),
                                    session.watch(),
                                    settings.ping_interval,
                                    fault_tx.clone(),
                                );
                                keepalive = Some(tokio::spawn(driver.run()));
                            }
                            SessionAction::Deliver(event) => {
                                info!(
                                    "Connection #{}: SMS from {} ({}), code {}.",
                                    connection_id, event.originator, event.country, event.code
                                );
                                notifier.spawn_delivery(format_alert(&event, notifier.footer()));
                            }
                            SessionAction::Drop(e) => {
                                warn!("Connection #{}: dropping frame: {}", connection_id, e);
                                debug!("Raw frame: {}", text.as_str());
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Connection #{}: upstream sent close {:?}.", connection_id, frame);
                        return Ok(());
                    }
                    // Binary frames are not part of the feed; pings are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(RelayError::from(e)),
                    None => {
                        info!("Connection #{}: upstream stream ended.", connection_id);
                        return Ok(());
                    }
                },
                Some(e) = fault_rx.recv() => return Err(e),
                res = join_writer(&mut writer) => {
                    return Err(res.err().unwrap_or(RelayError::SendAfterClose));
                }
            }
        }
    }
    .await;

    session.close();
    let lifetime = Local::now() - session.opened_at();
    info!(
        "Connection #{}: closed after {}s.",
        connection_id,
        lifetime.num_seconds()
    );

    // The driver sees `Closed` right away unless it is stuck waiting on the writer.
    if let Some(mut handle) = keepalive
        && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut handle)
            .await
            .is_err()
    {
        handle.abort();
    }
    drop(sender);
    if let Some(handle) = writer {
        let abort = handle.abort_handle();
        match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, handle).await {
            Ok(Ok(Err(e))) => debug!("Connection #{}: writer closed with {}.", connection_id, e),
            Ok(_) => {}
            Err(_) => {
                warn!("Connection #{}: writer did not drain in time, aborting.", connection_id);
                abort.abort();
            }
        }
    }

    result
}
