// src/core/errors.rs

//! Defines the primary error type for the relay core.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The main error enum, representing all possible runtime failures within the relay.
/// Configuration and startup failures are reported through `anyhow` instead.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {0:?} while connecting to upstream")]
    ConnectTimeout(Duration),

    #[error("Attempted to send a frame on a closed connection")]
    SendAfterClose,

    #[error("Malformed application frame: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(String),

    #[error("Delivery rejected with status {status}: {body}")]
    DeliveryRejected { status: u16, body: String },

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for RelayError {
    fn clone(&self) -> Self {
        match self {
            RelayError::Io(e) => RelayError::Io(Arc::clone(e)),
            RelayError::Transport(s) => RelayError::Transport(s.clone()),
            RelayError::ConnectTimeout(d) => RelayError::ConnectTimeout(*d),
            RelayError::SendAfterClose => RelayError::SendAfterClose,
            RelayError::Decode(s) => RelayError::Decode(s.clone()),
            RelayError::Json(s) => RelayError::Json(s.clone()),
            RelayError::HttpClientError(s) => RelayError::HttpClientError(s.clone()),
            RelayError::DeliveryRejected { status, body } => RelayError::DeliveryRejected {
                status: *status,
                body: body.clone(),
            },
            RelayError::InvalidState(s) => RelayError::InvalidState(s.clone()),
            RelayError::Internal(s) => RelayError::Internal(s.clone()),
        }
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelayError::Io(e1), RelayError::Io(e2)) => e1.to_string() == e2.to_string(),
            (RelayError::Transport(s1), RelayError::Transport(s2)) => s1 == s2,
            (RelayError::ConnectTimeout(d1), RelayError::ConnectTimeout(d2)) => d1 == d2,
            (RelayError::Decode(s1), RelayError::Decode(s2)) => s1 == s2,
            (RelayError::Json(s1), RelayError::Json(s2)) => s1 == s2,
            (RelayError::HttpClientError(s1), RelayError::HttpClientError(s2)) => s1 == s2,
            (
                RelayError::DeliveryRejected {
                    status: s1,
                    body: b1,
                },
                RelayError::DeliveryRejected {
                    status: s2,
                    body: b2,
                },
            ) => s1 == s2 && b1 == b2,
            (RelayError::InvalidState(s1), RelayError::InvalidState(s2)) => s1 == s2,
            (RelayError::Internal(s1), RelayError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl RelayError {
    /// True for failures that end the current upstream connection.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::Io(_)
                | RelayError::Transport(_)
                | RelayError::ConnectTimeout(_)
                | RelayError::SendAfterClose
        )
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(Arc::new(e))
    }
}

impl From<tungstenite::Error> for RelayError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::Io(io) => RelayError::Io(Arc::new(io)),
            tungstenite::Error::AlreadyClosed | tungstenite::Error::ConnectionClosed => {
                RelayError::SendAfterClose
            }
            other => RelayError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::HttpClientError(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Json(e.to_string())
    }
}
