// src/core/relay/session.rs

//! The per-connection session state machine.
//!
//! A [`Session`] owns the lifecycle state of one upstream connection and decides
//! what each inbound frame means. It performs no I/O itself: it returns a
//! [`SessionAction`] that the connection driver carries out. The current state is
//! published on a `watch` channel so the keepalive driver can observe join and
//! closure without sharing mutable state with the receive loop.

use crate::core::RelayError;
use crate::core::metrics;
use crate::core::protocol::{InboundFrame, Namespace, SmsEvent};
use chrono::{DateTime, Local};
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// The lifecycle of a single upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Joined,
    Closed,
}

impl SessionState {
    /// Keepalive frames may only be sent once the namespace join is acknowledged.
    pub fn is_keepalive_eligible(self) -> bool {
        self == SessionState::Joined
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Joined => "joined",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What the connection driver should do after a frame has been processed.
#[derive(Debug)]
pub enum SessionAction {
    /// Nothing to do (heartbeat, unrecognized frame, or frame after close).
    None,
    /// The namespace was joined for the first time: start the keepalive driver.
    StartKeepalive,
    /// A well-formed SMS event to format and deliver.
    Deliver(SmsEvent),
    /// A malformed application frame that was dropped.
    Drop(RelayError),
}

/// A read-only view of a session's state, handed to the keepalive driver.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<SessionState>,
}

impl SessionWatch {
    pub fn state(&self) -> SessionState {
        *self.rx.borrow()
    }

    pub fn is_keepalive_eligible(&self) -> bool {
        self.state().is_keepalive_eligible()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Resolves once the session is closed or has been dropped.
    pub async fn closed(&mut self) {
        let _ = self.rx.wait_for(|s| *s == SessionState::Closed).await;
    }
}

pub struct Session {
    connection_id: u64,
    opened_at: DateTime<Local>,
    namespace: Namespace,
    state_tx: watch::Sender<SessionState>,
    keepalive_started: bool,
}

impl Session {
    /// Creates a session in the `Connecting` state for a freshly opened transport.
    pub fn new(connection_id: u64, namespace: Namespace) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Connecting);
        Self {
            connection_id,
            opened_at: Local::now(),
            namespace,
            state_tx,
            keepalive_started: false,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn opened_at(&self) -> DateTime<Local> {
        self.opened_at
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            rx: self.state_tx.subscribe(),
        }
    }

    /// Moves to `Handshaking` and returns the namespace-subscribe frame to send.
    pub fn begin_handshake(&mut self) -> Result<String, RelayError> {
        let state = self.state();
        if state != SessionState::Connecting {
            return Err(RelayError::InvalidState(format!(
                "cannot start handshake while {state}"
            )));
        }
        self.transition(SessionState::Handshaking);
        Ok(self.namespace.subscribe_frame().to_string())
    }

    /// Interprets one inbound text frame.
    pub fn handle_frame(&mut self, frame: &str, received_at: DateTime<Local>) -> SessionAction {
        if self.state() == SessionState::Closed {
            trace!(
                "Connection #{}: ignoring frame received after close.",
                self.connection_id
            );
            return SessionAction::None;
        }

        match self.namespace.classify(frame) {
            InboundFrame::Heartbeat => {
                debug!("Connection #{}: heartbeat acknowledged.", self.connection_id);
                SessionAction::None
            }
            InboundFrame::NamespaceJoinAck => {
                if self.keepalive_started {
                    debug!(
                        "Connection #{}: duplicate namespace join acknowledgment.",
                        self.connection_id
                    );
                    return SessionAction::None;
                }
                self.transition(SessionState::Joined);
                self.keepalive_started = true;
                info!(
                    "Connection #{}: namespace joined, starting keepalive.",
                    self.connection_id
                );
                SessionAction::StartKeepalive
            }
            InboundFrame::ApplicationEvent(payload) => {
                match SmsEvent::from_payload(payload, received_at) {
                    Ok(event) => {
                        metrics::EVENTS_DECODED_TOTAL.inc();
                        SessionAction::Deliver(event)
                    }
                    Err(e) => {
                        metrics::FRAMES_DROPPED_TOTAL.inc();
                        SessionAction::Drop(e)
                    }
                }
            }
            InboundFrame::Unrecognized => {
                trace!(
                    "Connection #{}: ignoring unrecognized frame {:?}.",
                    self.connection_id, frame
                );
                SessionAction::None
            }
        }
    }

    /// Moves to the terminal `Closed` state. Idempotent.
    pub fn close(&mut self) {
        if self.state() != SessionState::Closed {
            self.transition(SessionState::Closed);
        }
    }

    fn transition(&mut self, next: SessionState) {
        let prev = self.state_tx.send_replace(next);
        debug!(
            "Connection #{}: {} -> {}",
            self.connection_id, prev, next
        );
        metrics::SESSION_JOINED.set(if next == SessionState::Joined { 1.0 } else { 0.0 });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
