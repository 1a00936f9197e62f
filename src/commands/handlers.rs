//! Built-in command handlers: help, ping, info, stats, restart, reply.

use super::{format_uptime, Command, CommandContext};
use rand::seq::SliceRandom;
use std::time::Instant;
use tracing::info;
use yamato_core::error::YamatoError;

pub(super) async fn help(ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    let table = ctx.registry.snapshot();

    if let Some(name) = ctx.args.first() {
        let name = name.to_lowercase();
        let Some(cmd) = table.lookup(&name) else {
            return ctx.reply(&format!("❌ Command '{name}' not found!")).await;
        };
        let m = &cmd.manifest;
        let mut text = format!(
            "📖 *{}* Command\n\n\
             🔸 *Description:* {}\n\
             🔸 *Usage:* {}\n\
             🔸 *Category:* {}",
            m.name,
            m.description,
            m.usage_or_default(ctx.prefix),
            m.category,
        );
        if !m.aliases.is_empty() {
            text.push_str(&format!("\n🔸 *Aliases:* {}", m.aliases.join(", ")));
        }
        return ctx.reply(&text).await;
    }

    let mut text = String::from("📋 *Available Commands:*\n\n");
    for (category, commands) in table.by_category() {
        text.push_str(&format!("*{}:*\n", category.to_uppercase()));
        for cmd in commands {
            text.push_str(&format!("• {}{}\n", ctx.prefix, cmd.manifest.name));
        }
        text.push('\n');
    }
    text.push_str(&format!(
        "Use `{}help <command>` for detailed info about a specific command.",
        ctx.prefix
    ));
    ctx.reply(&text).await
}

pub(super) async fn ping(ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    let start = Instant::now();
    ctx.reply("🏓 Pinging...").await?;
    let latency = start.elapsed().as_millis();

    let status = ctx.connection.status();
    let text = format!(
        "🏓 *Pong!*\n\
         📊 Response Time: {latency}ms\n\
         🤖 Bot Status: Online ✅\n\
         ⏱️ Uptime: {}\n\
         📱 Connection: {}\n\
         🔄 Retry Count: {}/{}",
        format_uptime(ctx.uptime),
        status.state,
        status.retry_count,
        ctx.max_retries,
    );
    ctx.session
        .send_text(&ctx.message.chat_id, &text, None)
        .await
        .map(|_| ())
}

pub(super) async fn info(ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    let text = format!(
        "🤖 *{bot} Information*\n\n\
         👤 *Character:* {persona}\n\
         ⚡ *Commands:* {commands}\n\
         🎭 *Stickers:* {stickers}\n\
         🛡️ *Features:*\n\
         • AI chat replies in character\n\
         • Smart reply detection in groups\n\
         • Self-healing connection management\n\
         • Hot-reloadable commands\n\
         • User registration ({prefix}reg)\n\n\
         🌟 *Version:* {version}",
        bot = ctx.bot_name,
        persona = ctx.persona_name,
        commands = ctx.registry.len(),
        stickers = ctx.stickers.len(),
        prefix = ctx.prefix,
        version = env!("CARGO_PKG_VERSION"),
    );
    ctx.reply(&text).await
}

pub(super) async fn stats(ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    let status = ctx.connection.status();
    let text = format!(
        "📊 *Bot Statistics*\n\n\
         👥 *Total Users:* {users}\n\
         ⚡ *Total Commands:* {commands}\n\
         🕒 *Uptime:* {uptime}\n\
         🔄 *Process ID:* {pid}\n\
         📡 *Connection Attempts:* {attempts}\n\
         🔁 *Current Retry Count:* {retries}/{max}\n\
         🌐 *Connection State:* {state}\n\
         ✅ *Connection Status:* {connected}",
        users = ctx.store.user_count().await,
        commands = ctx.registry.len(),
        uptime = format_uptime(ctx.uptime),
        pid = std::process::id(),
        attempts = status.connection_attempts,
        retries = status.retry_count,
        max = ctx.max_retries,
        state = status.state,
        connected = if status.is_connected {
            "Connected"
        } else {
            "Disconnected"
        },
    );
    ctx.reply(&text).await
}

pub(super) async fn restart(ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    let number = ctx.message.sender_number();
    if !ctx.admin.is_admin(number) {
        return ctx
            .reply("❌ This command is only available for administrators.")
            .await;
    }

    ctx.reply("🔄 Restarting bot connection...").await?;
    info!("manual restart requested by {number}");
    ctx.store.flush().await?;
    ctx.connection.reconnect("manual restart requested").await;
    Ok(())
}

pub(super) async fn reply(cmd: &Command, ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    let line = cmd
        .manifest
        .replies
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| {
            YamatoError::Plugin(format!("command '{}' has no replies", cmd.manifest.name))
        })?;
    let fallback_name;
    let name = match ctx.speaker_name {
        Some(n) => n,
        None => {
            let number = ctx.message.sender_number();
            let tail = number
                .char_indices()
                .rev()
                .nth(3)
                .map_or(number, |(i, _)| &number[i..]);
            fallback_name = format!("User{tail}");
            &fallback_name
        }
    };
    ctx.reply(&line.replace("{name}", name)).await
}
