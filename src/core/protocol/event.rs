// src/core/protocol/event.rs

//! Decodes the JSON payload of an application event into an [`SmsEvent`].

use crate::core::RelayError;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// The code reported when a message body contains no recognizable OTP.
pub const NO_CODE: &str = "N/A";

/// Matches a 6-digit run, optionally split 3+3 by a hyphen or a space.
static OTP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}[- ]?\d{3}\b|\b\d{6}\b").expect("OTP pattern is a valid regex")
});

/// The named fields of the second array element. Unknown keys are ignored.
#[derive(Deserialize, Debug)]
struct SmsFields {
    #[serde(default)]
    message: String,
    #[serde(default = "default_originator")]
    originator: String,
    #[serde(default)]
    recipient: String,
    #[serde(default = "default_country")]
    country_iso: String,
}

fn default_originator() -> String {
    "Unknown".to_string()
}

fn default_country() -> String {
    "??".to_string()
}

/// A single incoming SMS as relayed by the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsEvent {
    pub originator: String,
    pub recipient: String,
    /// Upper-cased ISO country code, or `??` when the feed omits it.
    pub country: String,
    pub message: String,
    /// The first OTP-looking number in `message`, or [`NO_CODE`].
    pub code: String,
    pub received_at: DateTime<Local>,
}

impl SmsEvent {
    /// Decodes an event payload of the form `[eventName, {message, originator, ...}]`.
    ///
    /// The arrival time is supplied by the caller so that decoding stays a pure
    /// function of its inputs.
    pub fn from_payload(payload: &str, received_at: DateTime<Local>) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| RelayError::Decode(format!("payload is not JSON: {e}")))?;

        let Value::Array(mut items) = value else {
            return Err(RelayError::Decode("payload is not an array".to_string()));
        };
        if items.len() < 2 {
            return Err(RelayError::Decode(format!(
                "expected at least 2 array elements, got {}",
                items.len()
            )));
        }
        let body = items.swap_remove(1);
        if !body.is_object() {
            return Err(RelayError::Decode(
                "second array element is not an object".to_string(),
            ));
        }

        let fields: SmsFields = serde_json::from_value(body)
            .map_err(|e| RelayError::Decode(format!("unexpected field type: {e}")))?;

        Ok(Self {
            code: extract_code(&fields.message),
            originator: fields.originator,
            recipient: fields.recipient,
            country: fields.country_iso.to_uppercase(),
            message: fields.message,
            received_at,
        })
    }
}

/// Returns the first OTP-looking number in `message`, or [`NO_CODE`].
pub fn extract_code(message: &str) -> String {
    OTP_PATTERN
        .find(message)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| NO_CODE.to_string())
}
