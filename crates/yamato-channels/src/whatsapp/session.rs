//! `whatsapp-rust` implementation of the session traits.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info};
use wacore::download::MediaType;
use wacore_binary::builder::NodeBuilder;
use wacore_binary::jid::{Jid, SERVER_JID};
use wacore_binary::node::NodeContent;
use waproto::whatsapp as wa;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust::request::{InfoQuery, InfoQueryType};
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;
use yamato_core::{
    error::YamatoError,
    message::InboundMessage,
    retry::retry_with_backoff,
    session::EventSink,
    traits::{Connector, Session},
};

use super::events::translate;
use super::send::{send_retry_policy, split_message, text_message, MAX_TEXT_LEN};

/// File name of the session database inside the credential directory.
const SESSION_DB: &str = "session.db";

/// How long a ping IQ may go unanswered before the socket counts as dead.
/// Shorter than the health monitor's probe timeout.
const PING_DEADLINE: Duration = Duration::from_secs(5);

/// Opens WhatsApp Web sessions backed by a SQLite credential store.
#[derive(Debug, Default, Clone)]
pub struct WhatsAppConnector;

impl WhatsAppConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WhatsAppConnector {
    async fn open(
        &self,
        credentials_dir: &Path,
        events: EventSink,
    ) -> Result<Arc<dyn Session>, YamatoError> {
        std::fs::create_dir_all(credentials_dir)?;
        let db_path = credentials_dir.join(SESSION_DB);
        let db_path = db_path.to_string_lossy().to_string();
        info!(
            "opening whatsapp session (generation {}, store: {db_path})",
            events.generation()
        );

        let backend = Arc::new(
            whatsapp_rust_sqlite_storage::SqliteStore::new(&db_path)
                .await
                .map_err(|e| YamatoError::Channel(format!("whatsapp store init failed: {e}")))?,
        );

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .skip_history_sync()
            .on_event(move |event, _client| {
                let sink = events.clone();
                async move {
                    if let Some(event) = translate(event) {
                        if !sink.emit(event).await {
                            debug!("session event dropped, manager is gone");
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| YamatoError::Channel(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();
        // Reconnection belongs to the connection manager; a dropped socket
        // must surface as a close event, not a silent internal retry.
        client.enable_auto_reconnect.store(false, Ordering::Relaxed);

        let handle = bot
            .run()
            .await
            .map_err(|e| YamatoError::Channel(format!("whatsapp bot run failed: {e}")))?;

        Ok(Arc::new(WhatsAppSession {
            client,
            run_task: Mutex::new(Some(handle.abort_handle())),
        }))
    }
}

/// Result of one ping round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum PingOutcome {
    Pong,
    /// No answer within [`PING_DEADLINE`].
    NoAnswer,
    Failed(String),
}

/// Map a ping result to the probe contract: an unanswered ping or a failure
/// on a socket that is no longer open means the connection is dead; any
/// other failure is transient.
pub(super) fn ping_verdict(outcome: PingOutcome, still_connected: bool) -> Result<(), YamatoError> {
    match outcome {
        PingOutcome::Pong => Ok(()),
        PingOutcome::NoAnswer => Err(YamatoError::SocketClosed),
        PingOutcome::Failed(_) if !still_connected => Err(YamatoError::SocketClosed),
        PingOutcome::Failed(e) => Err(YamatoError::Channel(format!("ping failed: {e}"))),
    }
}

/// One live WhatsApp Web connection.
pub struct WhatsAppSession {
    client: Arc<Client>,
    /// The transport's run loop; aborted when the session ends.
    run_task: Mutex<Option<AbortHandle>>,
}

impl WhatsAppSession {
    fn parse_jid(jid: &str) -> Result<Jid, YamatoError> {
        jid.parse()
            .map_err(|e| YamatoError::Channel(format!("invalid whatsapp JID '{jid}': {e}")))
    }

    async fn ping(&self) -> PingOutcome {
        let server: Jid = match SERVER_JID.parse() {
            Ok(jid) => jid,
            Err(e) => return PingOutcome::Failed(format!("invalid server JID: {e}")),
        };
        let query = InfoQuery {
            namespace: "w:p",
            query_type: InfoQueryType::Get,
            to: server,
            target: None,
            id: None,
            content: Some(NodeContent::Nodes(vec![NodeBuilder::new("ping").build()])),
            timeout: Some(PING_DEADLINE),
        };
        match tokio::time::timeout(PING_DEADLINE, self.client.send_iq(query)).await {
            Ok(Ok(_)) => PingOutcome::Pong,
            Ok(Err(e)) => PingOutcome::Failed(e.to_string()),
            Err(_) => PingOutcome::NoAnswer,
        }
    }

    async fn deliver(&self, jid: &Jid, msg: wa::Message) -> Result<String, YamatoError> {
        if !self.client.is_connected() {
            return Err(YamatoError::SocketClosed);
        }
        retry_with_backoff(&send_retry_policy(), "whatsapp send", |_| {
            let msg = msg.clone();
            async move {
                self.client
                    .send_message(jid.clone(), msg)
                    .await
                    .map_err(|e| YamatoError::Channel(format!("whatsapp send failed: {e}")))
            }
        })
        .await
    }
}

#[async_trait]
impl Session for WhatsAppSession {
    async fn own_id(&self) -> Option<String> {
        self.client.get_pn().await.map(|jid| jid.to_string())
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        quoted: Option<&InboundMessage>,
    ) -> Result<String, YamatoError> {
        let jid = Self::parse_jid(chat_id)?;
        let mut last_id = String::new();
        // Only the first chunk quotes the original message.
        for (i, chunk) in split_message(text, MAX_TEXT_LEN).into_iter().enumerate() {
            let quote = if i == 0 { quoted } else { None };
            last_id = self.deliver(&jid, text_message(chunk, quote)).await?;
        }
        Ok(last_id)
    }

    async fn send_sticker(&self, chat_id: &str, sticker: &[u8]) -> Result<String, YamatoError> {
        let jid = Self::parse_jid(chat_id)?;
        let upload = self
            .client
            .upload(sticker.to_vec(), MediaType::Sticker)
            .await
            .map_err(|e| YamatoError::Channel(format!("sticker upload failed: {e}")))?;

        let msg = wa::Message {
            sticker_message: Some(Box::new(wa::message::StickerMessage {
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(sticker.len() as u64),
                mimetype: Some("image/webp".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        self.deliver(&jid, msg).await
    }

    async fn set_available(&self) -> Result<(), YamatoError> {
        use whatsapp_rust::PresenceStatus;

        self.client
            .presence()
            .set(PresenceStatus::Available)
            .await
            .map_err(|e| YamatoError::Channel(format!("presence update failed: {e}")))
    }

    async fn probe(&self) -> Result<(), YamatoError> {
        if !self.client.is_connected() {
            return Err(YamatoError::SocketClosed);
        }
        let outcome = self.ping().await;
        ping_verdict(outcome, self.client.is_connected())
    }

    async fn end(&self) {
        self.client.disconnect().await;
        let task = match self.run_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
        }
        info!("whatsapp session closed");
    }
}
