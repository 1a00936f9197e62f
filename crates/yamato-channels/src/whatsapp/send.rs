//! Outbound message construction and delivery retries.

use std::time::Duration;
use waproto::whatsapp as wa;
use yamato_core::{message::InboundMessage, retry::RetryPolicy};

/// WhatsApp's practical per-message text limit.
pub const MAX_TEXT_LEN: usize = 4096;

/// Sends are retried three times: 500ms, 1s, 2s.
pub fn send_retry_policy() -> RetryPolicy {
    RetryPolicy::exponential(3, Duration::from_millis(500))
}

/// Build a text message, quoting `quoted` when given.
pub fn text_message(text: &str, quoted: Option<&InboundMessage>) -> wa::Message {
    match quoted {
        None => wa::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        },
        Some(q) => {
            let context_info = wa::ContextInfo {
                stanza_id: Some(q.id.clone()),
                participant: Some(q.sender_id.clone()),
                quoted_message: q.text.as_ref().map(|t| {
                    Box::new(wa::Message {
                        conversation: Some(t.clone()),
                        ..Default::default()
                    })
                }),
                ..Default::default()
            };
            wa::Message {
                extended_text_message: Some(Box::new(wa::message::ExtendedTextMessage {
                    text: Some(text.to_string()),
                    context_info: Some(Box::new(context_info)),
                    ..Default::default()
                })),
                ..Default::default()
            }
        }
    }
}

/// Split a long message into chunks that respect the text limit, preferring
/// line breaks and never cutting inside a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
