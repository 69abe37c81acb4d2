// src/core/notify/telegram.rs

//! A minimal Telegram Bot API client that posts alerts with `sendMessage`.

use super::AlertSink;
use crate::core::RelayError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// The three link buttons attached below every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButtons {
    pub channel_url: String,
    pub dev_url: String,
    pub support_url: String,
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

impl LinkButtons {
    /// Encodes the buttons as the JSON `reply_markup` Telegram expects.
    pub fn reply_markup(&self) -> Result<String, RelayError> {
        let keyboard = InlineKeyboard {
            inline_keyboard: vec![
                vec![
                    InlineButton {
                        text: "📱Numbers",
                        url: &self.channel_url,
                    },
                    InlineButton {
                        text: "💻 Developer",
                        url: &self.dev_url,
                    },
                ],
                vec![InlineButton {
                    text: "🛠 Support",
                    url: &self.support_url,
                }],
            ],
        };
        Ok(serde_json::to_string(&keyboard)?)
    }
}

#[derive(Serialize)]
struct SendMessageForm<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    reply_markup: &'a str,
}

/// Posts alerts to a single chat through the Bot API.
///
/// Not `Debug`: the endpoint carries the bot token.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
    chat_id: String,
    reply_markup: String,
}

impl TelegramClient {
    /// Builds a client for `{api_base}/bot{token}/sendMessage`.
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: String,
        buttons: &LinkButtons,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id,
            reply_markup: buttons.reply_markup()?,
        })
    }
}

#[async_trait]
impl AlertSink for TelegramClient {
    async fn send(&self, text: &str) -> Result<(), RelayError> {
        let form = SendMessageForm {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            reply_markup: &self.reply_markup,
        };
        // The endpoint embeds the bot token, keep it out of error messages.
        let res = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| RelayError::from(e.without_url()))?;

        let status = res.status();
        if status != reqwest::StatusCode::OK {
            let body = res.text().await.unwrap_or_default();
            return Err(RelayError::DeliveryRejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("Telegram accepted the alert for chat {}.", self.chat_id);
        Ok(())
    }
}
