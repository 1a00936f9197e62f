//! Per-message processing: the batch loop and each message's route through
//! commands, registration, name memory and the persona.

use super::routing::{eligibility, extract_intro_name, is_registration, parse_command};
use super::Gateway;
use crate::commands::{self, CommandContext};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use yamato_channels::whatsapp::InboundBatch;
use yamato_core::{
    error::YamatoError,
    message::InboundMessage,
    session::UpsertKind,
    traits::Session,
};
use yamato_providers::PersonaRequest;

/// Longest error text echoed back to a chat.
const MAX_ERROR_ECHO: usize = 100;

impl Gateway {
    /// Handle every message of a batch in arrival order. Each message runs in
    /// its own task; a failing or panicking message is logged and does not
    /// affect the rest.
    pub async fn process_batch(self: &Arc<Self>, batch: InboundBatch) {
        if batch.kind != UpsertKind::Notify {
            debug!("ignoring {} appended messages", batch.messages.len());
            return;
        }

        let bot_id = match batch.session.own_id().await {
            Some(id) => Some(id),
            None => self.connection.status().own_id,
        };

        for msg in batch.messages {
            let gateway = Arc::clone(self);
            let session = Arc::clone(&batch.session);
            let bot_id = bot_id.clone();
            let id = msg.id.clone();
            let handled = tokio::spawn(async move {
                gateway
                    .handle_message(session.as_ref(), &msg, bot_id.as_deref())
                    .await
            })
            .await;
            match handled {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("message processing error for {id}: {e}"),
                Err(e) => error!("message processing aborted for {id}: {e}"),
            }
        }
    }

    pub(super) async fn handle_message(
        &self,
        session: &dyn Session,
        msg: &InboundMessage,
        bot_id: Option<&str>,
    ) -> Result<(), YamatoError> {
        if msg.from_me {
            return Ok(());
        }
        let Some(text) = msg.body() else {
            return Ok(());
        };

        info!(
            "message from {} in {}: {}",
            msg.sender_number(),
            if msg.is_group() { "group" } else { "private" },
            preview(text, 100),
        );

        let prefix = self.settings.prefix.as_str();
        if let Some(parsed) = parse_command(text, prefix) {
            if let Some(command) = self.registry.lookup(&parsed.name) {
                info!("executing command: {}", parsed.name);
                let speaker_name = self.remembered_name(&msg.sender_id).await;
                let ctx = CommandContext {
                    session,
                    message: msg,
                    args: &parsed.args,
                    speaker_name: speaker_name.as_deref(),
                    registry: &self.registry,
                    store: &self.store,
                    stickers: &self.stickers,
                    connection: self.connection.as_ref(),
                    admin: &self.settings.admin,
                    prefix,
                    bot_name: &self.settings.bot_name,
                    persona_name: self.persona.name(),
                    max_retries: self.settings.max_retries,
                    uptime: self.started.elapsed(),
                };
                if let Err(e) = commands::execute(&command, &ctx).await {
                    error!("command '{}' failed: {e}", parsed.name);
                    let notice = format!(
                        "❌ Error executing command: {}",
                        preview(&e.to_string(), MAX_ERROR_ECHO)
                    );
                    if let Err(send_err) = session.send_text(&msg.chat_id, &notice, Some(msg)).await {
                        error!("failed to send error message: {send_err}");
                    }
                }
                return Ok(());
            }
        }

        if is_registration(text, prefix) {
            return self.register(session, msg).await;
        }

        if let Some(name) = extract_intro_name(text) {
            info!("remembered name {name} for {}", msg.sender_number());
            self.names.lock().await.insert(msg.sender_id.clone(), name);
        }

        let decision = eligibility(msg, bot_id, self.persona_config());
        if !decision.should_respond() {
            debug!("not responding (group check: {:?})", decision);
            return Ok(());
        }
        debug!("responding ({})", decision.reason());

        self.respond(session, msg, text).await
    }

    async fn register(&self, session: &dyn Session, msg: &InboundMessage) -> Result<(), YamatoError> {
        let number = msg.sender_number();
        let text = match self.store.register(&msg.sender_id, number).await {
            Ok(reg) if reg.is_new() => {
                info!("registered new user {number}");
                format!("🎉 Successfully registered! Welcome, +{}", reg.record().number)
            }
            Ok(reg) => format!(
                "✅ Already registered, +{}. Welcome back!",
                reg.record().number
            ),
            Err(e) => {
                error!("registration error: {e}");
                "❌ Registration failed. Please try again later.".to_string()
            }
        };
        session.send_text(&msg.chat_id, &text, Some(msg)).await?;
        Ok(())
    }

    async fn respond(
        &self,
        session: &dyn Session,
        msg: &InboundMessage,
        text: &str,
    ) -> Result<(), YamatoError> {
        let speaker_name = self.remembered_name(&msg.sender_id).await;
        let last = self.last_sticker.lock().await.clone();
        let available = self.stickers.names();

        let answer = self
            .persona
            .ask(&PersonaRequest {
                text,
                speaker_name: speaker_name.as_deref(),
                available_stickers: &available,
                exclude_sticker: last.as_deref(),
            })
            .await;

        session
            .send_text(&msg.chat_id, &answer.reply, Some(msg))
            .await?;
        info!("sent reply: {}", preview(&answer.reply, 50));

        let Some(name) = answer.sticker else {
            return Ok(());
        };
        let Some(bytes) = self.stickers.get(&name) else {
            return Ok(());
        };
        match session.send_sticker(&msg.chat_id, bytes).await {
            Ok(_) => {
                info!("sent sticker: {name}");
                *self.last_sticker.lock().await = Some(name);
            }
            Err(e) => warn!("failed to send sticker {name}: {e}"),
        }
        Ok(())
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let truncated: String = text.chars().take(max).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
