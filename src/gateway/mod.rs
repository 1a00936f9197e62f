//! Gateway: the loop that turns inbound message batches into commands,
//! registrations and persona replies.

mod pipeline;
pub mod routing;


use crate::commands::CommandRegistry;
use crate::stickers::StickerCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use yamato_channels::whatsapp::{ConnectionStatus, InboundBatch, ManagerHandle};
use yamato_core::config::{AdminConfig, PersonaConfig};
use yamato_memory::Store;
use yamato_providers::Persona;

/// What the gateway (and its commands) may ask of the connection.
#[async_trait]
pub trait ConnectionControl: Send + Sync {
    fn status(&self) -> ConnectionStatus;

    /// Ask for a reconnection cycle.
    async fn reconnect(&self, reason: &str);
}

#[async_trait]
impl ConnectionControl for ManagerHandle {
    fn status(&self) -> ConnectionStatus {
        ManagerHandle::status(self)
    }

    async fn reconnect(&self, reason: &str) {
        ManagerHandle::reconnect(self, reason).await
    }
}

/// Static gateway settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub bot_name: String,
    pub prefix: String,
    pub admin: AdminConfig,
    pub max_retries: u32,
}

/// Routes inbound messages.
pub struct Gateway {
    pub(super) settings: GatewaySettings,
    pub(super) persona: Persona,
    pub(super) store: Arc<Store>,
    pub(super) stickers: Arc<StickerCache>,
    pub(super) registry: Arc<CommandRegistry>,
    pub(super) connection: Arc<dyn ConnectionControl>,
    /// Names senders introduced themselves with. Lives as long as the process.
    pub(super) names: Mutex<HashMap<String, String>>,
    /// Last sticker actually delivered.
    pub(super) last_sticker: Mutex<Option<String>>,
    pub(super) started: Instant,
}

impl Gateway {
    pub fn new(
        settings: GatewaySettings,
        persona: Persona,
        store: Arc<Store>,
        stickers: Arc<StickerCache>,
        registry: Arc<CommandRegistry>,
        connection: Arc<dyn ConnectionControl>,
    ) -> Self {
        Self {
            settings,
            persona,
            store,
            stickers,
            registry,
            connection,
            names: Mutex::new(HashMap::new()),
            last_sticker: Mutex::new(None),
            started: Instant::now(),
        }
    }

    pub(super) fn persona_config(&self) -> &PersonaConfig {
        self.persona.config()
    }

    /// Remembered name for `sender_id`.
    pub async fn remembered_name(&self, sender_id: &str) -> Option<String> {
        self.names.lock().await.get(sender_id).cloned()
    }

    /// Process batches until the connection manager goes away.
    pub async fn run(self: Arc<Self>, mut batches: mpsc::Receiver<InboundBatch>) {
        info!(
            "{} gateway running | persona: {} | ai: {} | commands: {} | stickers: {}",
            self.settings.bot_name,
            self.persona.name(),
            if self.persona.has_provider() {
                "enabled"
            } else {
                "fallback only"
            },
            self.registry.len(),
            self.stickers.len(),
        );

        while let Some(batch) = batches.recv().await {
            self.process_batch(batch).await;
        }
        info!("inbound stream closed, gateway stopping");
    }
}
