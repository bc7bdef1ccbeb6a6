// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization filtering, chat classification, and message conversion.

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use valet_core::InboundMessage;

/// Telegram's hard limit on message text length.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Checks whether the message sender is authorized.
///
/// Authorization passes if the sender's user ID (as string) or username
/// matches any entry in the `allowed_users` list. If `allowed_users` is
/// empty, all messages are rejected (secure default).
///
/// Messages without a sender (e.g., channel posts) always return `false`.
pub fn is_authorized(msg: &Message, allowed_users: &[String]) -> bool {
    if allowed_users.is_empty() {
        return false;
    }

    let user = match msg.from.as_ref() {
        Some(u) => u,
        None => return false,
    };

    let user_id_str = user.id.0.to_string();

    for allowed in allowed_users {
        if *allowed == user_id_str {
            return true;
        }
        if let Some(ref username) = user.username {
            let allowed_clean = allowed.strip_prefix('@').unwrap_or(allowed);
            if username.eq_ignore_ascii_case(allowed_clean) {
                return true;
            }
        }
    }

    false
}

/// True for group and supergroup chats. Private chats and channels are
/// not groups.
pub fn is_group(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Public(_)) && !msg.chat.is_channel()
}

/// Converts an authorized Telegram text message into an
/// [`InboundMessage`]. The conversation key is the chat id.
pub fn to_inbound_message(msg: &Message, text: &str) -> InboundMessage {
    let (sender_name, sender_id) = msg
        .from
        .as_ref()
        .map(|u| (u.full_name(), u.id.0.to_string()))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

    InboundMessage {
        conversation_key: msg.chat.id.0.to_string(),
        transport_message_id: msg.id.0.to_string(),
        sender_name,
        sender_id,
        text: text.to_string(),
        is_group: is_group(msg),
        group_title: msg.chat.title().map(|t| t.to_string()),
        received_at: msg.date.to_rfc3339(),
    }
}

/// Splits text into chunks of at most `limit` characters, preferring to
/// break at a newline, then a space, before cutting mid-word.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest: &str = text;
    while !rest.is_empty() {
        let window: String = rest.chars().take(limit).collect();
        if window.len() == rest.len() {
            chunks.push(rest.to_string());
            break;
        }

        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            // Only use a break point in the second half of the window.
            .filter(|&i| i > window.len() / 2)
            .map(|i| i + 1)
            .unwrap_or(window.len());

        chunks.push(rest[..cut].trim_end().to_string());
        rest = &rest[cut..];
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 4096), vec!["hello".to_string()]);
    }

    #[test]
    fn long_text_splits_within_the_limit() {
        let text = "a".repeat(10_000);
        let chunks = chunk_text(&text, 4096);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4096));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newline_breaks() {
        let text = format!("{}\n{}", "a".repeat(3000), "b".repeat(3000));
        let chunks = chunk_text(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chars().all(|c| c == 'a'));
        assert!(chunks[1].chars().all(|c| c == 'b'));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(5000);
        let chunks = chunk_text(&text, 4096);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4096));
    }
}
