// src/core/relay/transport.rs

//! Opens upstream WebSocket connections.

use crate::core::RelayError;
use async_trait::async_trait;
use futures::{Sink, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HOST, ORIGIN, REFERER, USER_AGENT};
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// The write half of an open connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
/// The read half of an open connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Something that can open a fresh upstream connection on demand.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), RelayError>;
}

/// The request headers the upstream requires before it accepts a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamHeaders {
    pub user_agent: String,
    pub origin: String,
    pub referer: String,
    pub host: String,
}

/// Connects to the upstream feed over WebSocket (ws or wss).
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    headers: HeaderMap,
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(
        url: String,
        headers: &UpstreamHeaders,
        connect_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let mut map = HeaderMap::new();
        for (name, value) in [
            (USER_AGENT, &headers.user_agent),
            (ORIGIN, &headers.origin),
            (REFERER, &headers.referer),
            (HOST, &headers.host),
        ] {
            let value = HeaderValue::from_str(value).map_err(|e| {
                RelayError::Internal(format!("invalid value for header '{name}': {e}"))
            })?;
            map.insert(name, value);
        }
        Ok(Self {
            url,
            headers: map,
            connect_timeout,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(FrameSink, FrameStream), RelayError> {
        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in &self.headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }

        let (ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| RelayError::ConnectTimeout(self.connect_timeout))??;
        debug!("Upstream accepted the upgrade with status {}.", response.status());

        let (sink, stream) = ws.split();
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
