// src/core/notify/format.rs

//! Renders an [`SmsEvent`] into the HTML alert posted to the chat.

use crate::core::protocol::SmsEvent;
use std::fmt::Write;

/// The character used to hide the leading digits of a recipient number.
pub const MASK_CHAR: char = '⁕';
/// Number of trailing recipient characters left visible.
const VISIBLE_SUFFIX: usize = 4;

const UNKNOWN: &str = "Unknown";
const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Lower-case keywords searched for in the message body, with their display name.
/// The first keyword contained in the body wins.
const KNOWN_SERVICES: &[(&str, &str)] = &[("whatsapp", "WhatsApp")];

/// Hides all but the last four characters of `recipient`.
/// Recipients shorter than four characters are reported as `Unknown`.
pub fn mask_recipient(recipient: &str) -> String {
    let len = recipient.chars().count();
    if len < VISIBLE_SUFFIX {
        return UNKNOWN.to_string();
    }
    let hidden = len - VISIBLE_SUFFIX;
    recipient
        .chars()
        .enumerate()
        .map(|(i, c)| if i < hidden { MASK_CHAR } else { c })
        .collect()
}

/// Guesses the sending service from the message body.
pub fn infer_service(message: &str) -> &'static str {
    let lowered = message.to_lowercase();
    KNOWN_SERVICES
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN)
}

/// Escapes the characters significant to Telegram's HTML parse mode.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Builds the alert text for `event`. An optional footer is appended in italics.
pub fn format_alert(event: &SmsEvent, footer: Option<&str>) -> String {
    let mut text = String::with_capacity(512 + event.message.len());

    // Writing into a String cannot fail.
    let _ = write!(
        text,
        "🔔 <b><u>Real-Time OTP Alert</u></b>\n\
         {RULE}\n\
         🌐 <b>Country:</b> <code>{country}</code>\n\
         🪪 <b>Originator:</b> <code>{originator}</code>\n\
         🔢 <b>OTP Code:</b> <code>{code}</code>\n\
         ⏰ <b>Received At:</b> <code>{time}</code>\n\
         📱 <b>Recipient:</b> <code>{recipient}</code>\n\
         ⚙️ <b>Service:</b> <code>{service}</code>\n\
         {RULE}\n\
         📝 <b>Full Message:</b>\n\
         <code>{message}</code>\n\
         {RULE}",
        country = escape_html(&event.country),
        originator = escape_html(&event.originator),
        code = escape_html(&event.code),
        time = event.received_at.format("%H:%M:%S"),
        recipient = escape_html(&mask_recipient(&event.recipient)),
        service = infer_service(&event.message),
        message = escape_html(&event.message),
    );

    if let Some(footer) = footer {
        let _ = write!(text, "\n📡 <i>{}</i>", escape_html(footer));
    }
    text
}
