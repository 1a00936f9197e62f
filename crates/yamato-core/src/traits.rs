use std::path::Path;
use std::sync::Arc;

use crate::{
    context::{Completion, Context},
    error::YamatoError,
    message::InboundMessage,
    session::EventSink,
};
use async_trait::async_trait;

/// AI Provider trait.
///
/// Any chat-completion backend implements this to give the persona layer a
/// uniform interface.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a request to the provider and get a completion back.
    async fn complete(&self, context: &Context) -> Result<Completion, YamatoError>;
}

/// One live connection to the messaging transport.
///
/// Lifecycle notifications flow out through the [`EventSink`] the session was
/// opened with; this trait covers everything the bot asks of it.
#[async_trait]
pub trait Session: Send + Sync {
    /// The bot's own identity once authenticated.
    async fn own_id(&self) -> Option<String>;

    /// Send a text message, optionally quoting `quoted`. Returns the message ID.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<String, YamatoError>;

    /// Send pre-encoded sticker bytes. Returns the message ID.
    async fn send_sticker(&self, chat_id: &str, sticker: &[u8]) -> Result<String, YamatoError>;

    /// Announce presence as available.
    async fn set_available(&self) -> Result<(), YamatoError>;

    /// Lightweight liveness probe. `Err(YamatoError::SocketClosed)` means the
    /// socket is gone; other errors are transient.
    async fn probe(&self) -> Result<(), YamatoError>;

    /// Close the connection. Errors are swallowed.
    async fn end(&self);
}

/// Opens sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Start a session using the credentials stored under `credentials_dir`.
    ///
    /// Returns once the session object exists; the connection itself opens
    /// asynchronously and reports through `events`.
    async fn open(
        &self,
        credentials_dir: &Path,
        events: EventSink,
    ) -> Result<Arc<dyn Session>, YamatoError>;
}
