use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suffix the transport uses for group chat identities.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Suffix the transport uses for personal chat identities.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";

/// A normalized inbound chat message.
///
/// Carries only what the router needs: text, who sent it, where, and the
/// reply/mention markers used for group eligibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message ID (used when quoting the message in a reply).
    pub id: String,
    /// Chat the message arrived in (`...@g.us` for groups).
    pub chat_id: String,
    /// Author identity. Equals `chat_id` in direct chats.
    pub sender_id: String,
    /// Text body, caption included. `None` for content-less messages.
    pub text: Option<String>,
    /// Whether the bot account authored this message.
    pub from_me: bool,
    /// Author of the message this one replies to, if any.
    pub quoted_author: Option<String>,
    /// Identities explicitly @mentioned.
    #[serde(default)]
    pub mentions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Whether the message was posted in a group conversation.
    pub fn is_group(&self) -> bool {
        self.chat_id.ends_with(GROUP_SUFFIX)
    }

    /// Phone-number part of the sender identity (`5511...@s.whatsapp.net` → `5511...`).
    pub fn sender_number(&self) -> &str {
        self.sender_id
            .split('@')
            .next()
            .unwrap_or(&self.sender_id)
    }

    /// Non-blank text body, if any.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Strip the device suffix from an identity: `123:7@s.whatsapp.net` → `123@s.whatsapp.net`.
pub fn normalize_jid(jid: &str) -> String {
    let (user, server) = jid.split_once('@').unwrap_or((jid, "s.whatsapp.net"));
    let user = user.split(':').next().unwrap_or(user);
    format!("{user}@{server}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_detection() {
        let msg = InboundMessage {
            chat_id: "120363001234567890@g.us".into(),
            ..Default::default()
        };
        assert!(msg.is_group());

        let msg = InboundMessage {
            chat_id: "5511999887766@s.whatsapp.net".into(),
            ..Default::default()
        };
        assert!(!msg.is_group());
    }

    #[test]
    fn test_sender_number() {
        let msg = InboundMessage {
            sender_id: "5511999887766@s.whatsapp.net".into(),
            ..Default::default()
        };
        assert_eq!(msg.sender_number(), "5511999887766");
    }

    #[test]
    fn test_body_ignores_blank_text() {
        let mut msg = InboundMessage::default();
        assert_eq!(msg.body(), None);
        msg.text = Some("   ".into());
        assert_eq!(msg.body(), None);
        msg.text = Some("hi".into());
        assert_eq!(msg.body(), Some("hi"));
    }

    #[test]
    fn test_normalize_jid() {
        assert_eq!(
            normalize_jid("5511999887766:12@s.whatsapp.net"),
            "5511999887766@s.whatsapp.net"
        );
        assert_eq!(
            normalize_jid("5511999887766@s.whatsapp.net"),
            "5511999887766@s.whatsapp.net"
        );
        assert_eq!(normalize_jid("5511999887766"), "5511999887766@s.whatsapp.net");
    }
}
