//! Pure routing decisions: command parsing, self-introductions and group
//! reply eligibility.

use regex::Regex;
use std::sync::OnceLock;
use yamato_core::{
    config::PersonaConfig,
    message::{normalize_jid, InboundMessage},
};

/// Literal registration directive (without prefix).
pub const REGISTER_COMMAND: &str = "reg";

/// A parsed `/name arg arg` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lower-cased command name.
    pub name: String,
    pub args: Vec<String>,
}

/// Split `text` into a command name and whitespace-separated args.
///
/// Returns `None` when the text does not start with `prefix` or names nothing.
pub fn parse_command(text: &str, prefix: &str) -> Option<ParsedCommand> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();
    let first = parts.next()?;
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(ParsedCommand {
        name: first.to_lowercase(),
        args: parts.map(str::to_string).collect(),
    })
}

/// Whether `text` is exactly the registration directive.
pub fn is_registration(text: &str, prefix: &str) -> bool {
    text.trim()
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.eq_ignore_ascii_case(REGISTER_COMMAND))
}

fn intro_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)(?:i'm|i am|my name is|call me)\s+([a-zA-Z0-9_]{2,20})").ok()
        })
        .as_ref()
}

/// The name from a self-introduction ("I'm Ray", "call me ray_01").
pub fn extract_intro_name(text: &str) -> Option<String> {
    intro_pattern()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The message quotes something the bot wrote.
pub fn is_reply_to_bot(msg: &InboundMessage, bot_id: &str) -> bool {
    msg.quoted_author
        .as_deref()
        .is_some_and(|author| normalize_jid(author) == normalize_jid(bot_id))
}

/// The bot's identity is in the message's @mention list.
pub fn is_bot_tagged(msg: &InboundMessage, bot_id: &str) -> bool {
    let bot = normalize_jid(bot_id);
    msg.mentions.iter().any(|m| normalize_jid(m) == bot)
}

/// The persona name appears anywhere in the text, case-insensitively.
pub fn is_name_mentioned(text: &str, persona: &PersonaConfig) -> bool {
    let name = persona.name.to_lowercase();
    !name.is_empty() && text.to_lowercase().contains(&name)
}

/// The text opens with a greeting addressed to the persona ("hey yamato").
pub fn is_greeting(text: &str, persona: &PersonaConfig) -> bool {
    let lower = text.trim_start().to_lowercase();
    let name = persona.name.to_lowercase();
    persona
        .greetings
        .iter()
        .any(|g| lower.starts_with(&format!("{} {name}", g.to_lowercase())))
}

/// Why a group message is (or is not) addressed to the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eligibility {
    /// One-to-one chat; always answered.
    pub direct: bool,
    pub reply: bool,
    pub mention: bool,
    pub greeting: bool,
}

impl Eligibility {
    /// Direct chats are always eligible.
    pub fn direct() -> Self {
        Self {
            direct: true,
            ..Self::default()
        }
    }

    pub fn should_respond(&self) -> bool {
        self.direct || self.reply || self.mention || self.greeting
    }

    /// Strongest signal, for logging.
    pub fn reason(&self) -> &'static str {
        if self.direct {
            "direct"
        } else if self.reply {
            "reply"
        } else if self.mention {
            "mention"
        } else if self.greeting {
            "greeting"
        } else {
            "none"
        }
    }
}

/// Decide whether the bot should answer `msg`.
///
/// Reply and @mention checks need the bot's own identity; without one the
/// name and greeting checks still apply.
pub fn eligibility(
    msg: &InboundMessage,
    bot_id: Option<&str>,
    persona: &PersonaConfig,
) -> Eligibility {
    if !msg.is_group() {
        return Eligibility::direct();
    }
    let text = msg.body().unwrap_or_default();
    let reply = bot_id.is_some_and(|id| is_reply_to_bot(msg, id));
    let tagged = bot_id.is_some_and(|id| is_bot_tagged(msg, id));
    Eligibility {
        direct: false,
        reply,
        mention: tagged || is_name_mentioned(text, persona),
        greeting: is_greeting(text, persona),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "15550009999:12@s.whatsapp.net";
    const GROUP: &str = "120363001234567890@g.us";

    fn group_msg(text: &str) -> InboundMessage {
        InboundMessage {
            id: "ABC".into(),
            chat_id: GROUP.into(),
            sender_id: "15550001111@s.whatsapp.net".into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_command() {
        let cmd = parse_command("/Help ping  now", "/").unwrap();
        assert_eq!(cmd.name, "help");
        assert_eq!(cmd.args, vec!["ping", "now"]);
        assert_eq!(parse_command("/ping", "/").unwrap().args.len(), 0);
        assert!(parse_command("hello /ping", "/").is_none());
        assert!(parse_command("/", "/").is_none());
        assert!(parse_command("/ ping", "/").is_none());
        assert_eq!(parse_command("!joke", "!").unwrap().name, "joke");
    }

    #[test]
    fn test_registration_directive() {
        assert!(is_registration("/reg", "/"));
        assert!(is_registration("  /REG ", "/"));
        assert!(!is_registration("/register", "/"));
        assert!(!is_registration("/reg me", "/"));
        assert!(!is_registration("reg", "/"));
    }

    #[test]
    fn test_extract_intro_name() {
        assert_eq!(extract_intro_name("hi, I'm Ray").as_deref(), Some("Ray"));
        assert_eq!(extract_intro_name("MY NAME IS zoro_99").as_deref(), Some("zoro_99"));
        assert_eq!(extract_intro_name("just call me Lu!").as_deref(), Some("Lu"));
        assert_eq!(extract_intro_name("i am X"), None);
        assert_eq!(extract_intro_name("hello there"), None);
        // Longer tokens are cut at 20 characters.
        assert_eq!(
            extract_intro_name("i am abcdefghijklmnopqrstuvwxyz").as_deref(),
            Some("abcdefghijklmnopqrst")
        );
    }

    #[test]
    fn test_reply_to_bot_ignores_device_suffix() {
        let mut msg = group_msg("lol");
        msg.quoted_author = Some("15550009999@s.whatsapp.net".into());
        assert!(is_reply_to_bot(&msg, BOT));
        msg.quoted_author = Some("15550002222@s.whatsapp.net".into());
        assert!(!is_reply_to_bot(&msg, BOT));
        msg.quoted_author = None;
        assert!(!is_reply_to_bot(&msg, BOT));
    }

    #[test]
    fn test_mention_by_jid_or_name() {
        let persona = PersonaConfig::default();
        let mut msg = group_msg("what do you think @15550009999");
        assert!(!is_bot_tagged(&msg, BOT));
        msg.mentions = vec!["15550009999@s.whatsapp.net".into()];
        assert!(is_bot_tagged(&msg, BOT));

        assert!(is_name_mentioned("is YAMATO around?", &persona));
        assert!(!is_name_mentioned("is anyone around?", &persona));
    }

    #[test]
    fn test_greeting() {
        let persona = PersonaConfig::default();
        assert!(is_greeting("Hey Yamato, sup", &persona));
        assert!(is_greeting("hello yamato", &persona));
        assert!(!is_greeting("hey everyone", &persona));
        assert!(!is_greeting("well hey yamato", &persona));
    }

    #[test]
    fn test_direct_chat_always_eligible() {
        let persona = PersonaConfig::default();
        let msg = InboundMessage {
            chat_id: "15550001111@s.whatsapp.net".into(),
            sender_id: "15550001111@s.whatsapp.net".into(),
            text: Some("anything".into()),
            ..Default::default()
        };
        let e = eligibility(&msg, None, &persona);
        assert!(e.should_respond());
        assert_eq!(e.reason(), "direct");
        assert!(!e.greeting);
    }

    #[test]
    fn test_group_eligibility_signals() {
        let persona = PersonaConfig::default();

        let plain = group_msg("random chatter");
        let e = eligibility(&plain, Some(BOT), &persona);
        assert!(!e.should_respond());
        assert_eq!(e.reason(), "none");

        let mut reply = group_msg("ok");
        reply.quoted_author = Some("15550009999@s.whatsapp.net".into());
        let e = eligibility(&reply, Some(BOT), &persona);
        assert!(e.should_respond());
        assert_eq!(e.reason(), "reply");

        let e = eligibility(&group_msg("hey yamato"), Some(BOT), &persona);
        assert!(e.mention && e.greeting);
        assert_eq!(e.reason(), "mention");
    }

    #[test]
    fn test_group_without_bot_identity() {
        let persona = PersonaConfig::default();
        let mut msg = group_msg("is yamato around?");
        msg.quoted_author = Some("15550009999@s.whatsapp.net".into());
        msg.mentions = vec!["15550009999@s.whatsapp.net".into()];
        let e = eligibility(&msg, None, &persona);
        assert!(!e.reply);
        assert!(e.mention);
        assert!(e.should_respond());
        assert_eq!(e.reason(), "mention");

        let e = eligibility(&group_msg("random chatter"), None, &persona);
        assert!(!e.should_respond());
    }
}
