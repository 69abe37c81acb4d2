// src/core/notify/mod.rs

//! Downstream delivery of formatted alerts.
//!
//! A sink performs a single delivery attempt. The [`Notifier`] wraps a sink with the
//! bounded retry policy and is the only thing the relay core talks to. Delivery
//! failures are logged and counted here and never propagated to the caller.

pub mod format;
pub mod telegram;

use crate::core::RelayError;
use crate::core::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use format::{escape_html, format_alert, infer_service, mask_recipient};
pub use telegram::{LinkButtons, TelegramClient};

/// A downstream destination for alert text.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Performs exactly one delivery attempt.
    async fn send(&self, text: &str) -> Result<(), RelayError>;
}

/// How many times, and how far apart, a delivery is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Delivers alerts through a sink with retry. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn AlertSink>,
    policy: RetryPolicy,
    footer: Option<Arc<str>>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn AlertSink>, policy: RetryPolicy) -> Self {
        Self {
            sink,
            policy,
            footer: None,
        }
    }

    /// Sets the footer line appended to every alert.
    pub fn with_footer(mut self, footer: Option<String>) -> Self {
        self.footer = footer.map(Arc::from);
        self
    }

    pub fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    /// Sends `text`, retrying failed attempts up to the policy limit.
    ///
    /// Returns `true` once an attempt succeeds and `false` when every attempt failed.
    pub async fn deliver(&self, text: &str) -> bool {
        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            match self.sink.send(text).await {
                Ok(()) => {
                    info!("Alert delivered (attempt {}/{}).", attempt, attempts);
                    metrics::ALERTS_DELIVERED_TOTAL.inc();
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Alert delivery failed (attempt {}/{}): {}",
                        attempt, attempts, e
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
        error!("Giving up on alert after {} failed attempts.", attempts);
        metrics::ALERTS_FAILED_TOTAL.inc();
        false
    }

    /// Runs [`Notifier::deliver`] on its own task so the caller is never blocked.
    pub fn spawn_delivery(&self, text: String) -> JoinHandle<bool> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.deliver(&text).await })
    }
}
