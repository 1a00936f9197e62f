//! Translation of `whatsapp-rust` events into session events.

use tracing::{debug, warn};
use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use waproto::whatsapp as wa;
use yamato_core::{
    message::InboundMessage,
    session::{DisconnectReason, SessionEvent, UpsertKind},
};

/// Map a transport event to the lifecycle vocabulary. `None` = not interesting.
pub(super) fn translate(event: Event) -> Option<SessionEvent> {
    match event {
        Event::PairingQrCode { code, .. } => Some(SessionEvent::Qr(code)),
        Event::PairSuccess(_) => Some(SessionEvent::Paired),
        Event::PairError(info) => {
            warn!("whatsapp pairing failed: {info:?}");
            None
        }
        Event::Connected(_) => Some(SessionEvent::Open),
        Event::Disconnected(_) => Some(SessionEvent::Close(DisconnectReason::ConnectionLost)),
        Event::LoggedOut(info) => {
            debug!("whatsapp logged out: {:?}", info.reason);
            Some(SessionEvent::Close(DisconnectReason::LoggedOut))
        }
        Event::StreamReplaced(_) => {
            Some(SessionEvent::Close(DisconnectReason::ConnectionReplaced))
        }
        Event::StreamError(info) => Some(SessionEvent::Close(stream_error_reason(&info.code))),
        Event::TemporaryBan(info) => {
            warn!("whatsapp temporary ban: {:?}, expires in {:?}", info.code, info.expire);
            Some(SessionEvent::Close(DisconnectReason::Forbidden))
        }
        Event::ConnectFailure(info) => {
            warn!("whatsapp connect failure: {:?}", info.reason);
            Some(SessionEvent::Close(DisconnectReason::Unknown(None)))
        }
        Event::ClientOutdated(_) => {
            warn!("whatsapp rejected this client version as outdated");
            Some(SessionEvent::Close(DisconnectReason::Unknown(None)))
        }
        Event::Message(msg, info) => Some(SessionEvent::Messages {
            messages: vec![normalize(&msg, &info)],
            kind: UpsertKind::Notify,
        }),
        _ => None,
    }
}

/// Classify a stream error code (`"515"`, `"503"`, ...).
pub(super) fn stream_error_reason(code: &str) -> DisconnectReason {
    code.trim()
        .parse::<u16>()
        .map(DisconnectReason::from_status_code)
        .unwrap_or(DisconnectReason::Unknown(None))
}

/// Build the normalized view of a delivered message.
fn normalize(msg: &wa::Message, info: &MessageInfo) -> InboundMessage {
    let inner = unwrap_message(msg);
    let (quoted_author, mentions) = context_of(inner);

    let normalized = InboundMessage {
        id: info.id.clone(),
        chat_id: info.source.chat.to_string(),
        sender_id: info.source.sender.to_string(),
        text: text_of(inner),
        from_me: info.source.is_from_me,
        quoted_author,
        mentions,
        timestamp: chrono::Utc::now(),
    };
    debug!(
        "whatsapp msg: chat={}, sender={}, from_me={}, has_text={}",
        normalized.chat_id,
        normalized.sender_id,
        normalized.from_me,
        normalized.text.is_some()
    );
    normalized
}

/// Unwrap nested wrappers (device_sent, ephemeral, view_once).
pub(super) fn unwrap_message(msg: &wa::Message) -> &wa::Message {
    msg.device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg)
}

/// Text body or media caption.
pub(super) fn text_of(msg: &wa::Message) -> Option<String> {
    msg.conversation
        .as_deref()
        .or_else(|| {
            msg.extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .or_else(|| msg.image_message.as_ref().and_then(|i| i.caption.as_deref()))
        .or_else(|| msg.video_message.as_ref().and_then(|v| v.caption.as_deref()))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Quoted author and mention list from whichever part carries context info.
pub(super) fn context_of(msg: &wa::Message) -> (Option<String>, Vec<String>) {
    let ctx = msg
        .extended_text_message
        .as_ref()
        .and_then(|e| e.context_info.as_deref())
        .or_else(|| {
            msg.image_message
                .as_ref()
                .and_then(|i| i.context_info.as_deref())
        })
        .or_else(|| {
            msg.video_message
                .as_ref()
                .and_then(|v| v.context_info.as_deref())
        });

    match ctx {
        Some(ctx) => (ctx.participant.clone(), ctx.mentioned_jid.clone()),
        None => (None, Vec::new()),
    }
}
