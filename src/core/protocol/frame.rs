// src/core/protocol/frame.rs

//! Classifies raw socket.io text frames received over the upstream WebSocket.
//!
//! Only the small subset of the socket.io / engine.io framing used by the live SMS
//! feed is understood here:
//!
//! - `3` is the heartbeat acknowledgment (and the keepalive frame we send),
//! - `40<namespace>` subscribes to, or acknowledges joining, a namespace,
//! - `42<namespace>,<json>` carries an application event for that namespace.
//!
//! Everything else (engine.io open packets, server pings, other namespaces) is
//! reported as [`InboundFrame::Unrecognized`] and ignored by the session.

/// The engine.io token exchanged as keepalive in both directions.
pub const HEARTBEAT_TOKEN: &str = "3";

/// The socket.io packet type prefix for a namespace connect.
const CONNECT_PREFIX: &str = "40";
/// The socket.io packet type prefix for an event.
const EVENT_PREFIX: &str = "42";

/// The namespace used when the configuration does not name one.
pub const DEFAULT_NAMESPACE: &str = "/livesms";

/// One inbound frame after classification. Borrowed from the frame text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame<'a> {
    Heartbeat,
    NamespaceJoinAck,
    /// The remainder of the frame after the event prefix, expected to be a JSON array.
    ApplicationEvent(&'a str),
    Unrecognized,
}

/// The framing rules for a single socket.io namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    join_prefix: String,
    event_prefix: String,
}

impl Namespace {
    /// Builds the framing for `name`, e.g. `/livesms`.
    pub fn new(name: &str) -> Self {
        Self {
            join_prefix: format!("{CONNECT_PREFIX}{name}"),
            event_prefix: format!("{EVENT_PREFIX}{name},"),
        }
    }

    /// The frame sent right after the transport opens to join the namespace.
    /// The server echoes the same prefix back as its join acknowledgment.
    pub fn subscribe_frame(&self) -> &str {
        &self.join_prefix
    }

    /// Classifies one raw text frame. Pure; never fails.
    pub fn classify<'a>(&self, frame: &'a str) -> InboundFrame<'a> {
        if frame == HEARTBEAT_TOKEN {
            InboundFrame::Heartbeat
        } else if let Some(payload) = frame.strip_prefix(self.event_prefix.as_str()) {
            InboundFrame::ApplicationEvent(payload)
        } else if frame.starts_with(self.join_prefix.as_str()) {
            InboundFrame::NamespaceJoinAck
        } else {
            InboundFrame::Unrecognized
        }
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
