//! Inbound messaging-channel grammar
//!
//! Replies on the external channel are free text of the form
//! `YES <order-id-prefix>` / `NO <order-id-prefix>`, where the prefix is
//! at least eight lowercase hex digits of the responder's own order id.
//! Everything else is a parse failure reported to the responder only.

use types::errors::ConfirmationError;

/// A parsed control reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReply {
    pub accepted: bool,
    pub order_prefix: String,
}

/// Parse `^(YES|NO)\s+([0-9a-f]{8,})\b` out of a raw reply.
pub fn parse_reply(text: &str) -> Result<TextReply, ConfirmationError> {
    let text = text.trim_start();
    let (accepted, rest) = if let Some(rest) = text.strip_prefix("YES") {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix("NO") {
        (false, rest)
    } else {
        return Err(ConfirmationError::Unparseable(
            "reply must start with YES or NO".into(),
        ));
    };

    if !rest.starts_with(char::is_whitespace) {
        return Err(ConfirmationError::Unparseable(
            "expected whitespace after YES/NO".into(),
        ));
    }
    let token = rest.trim_start();

    let hex_len = token
        .bytes()
        .take_while(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
        .count();
    if hex_len < 8 {
        return Err(ConfirmationError::Unparseable(
            "expected at least eight hex digits of the order id".into(),
        ));
    }
    // Word boundary: the hex run must not continue into other word
    // characters.
    if token[hex_len..]
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
    {
        return Err(ConfirmationError::Unparseable(
            "order id token contains unexpected characters".into(),
        ));
    }

    Ok(TextReply {
        accepted,
        order_prefix: token[..hex_len].to_string(),
    })
}
