//! Command registry: manifest-declared commands bound to compiled-in handlers.
//!
//! The table is rebuilt from disk on every reload and swapped in whole, so a
//! lookup sees either the old table or the new one, never a mix.

mod handlers;


use crate::gateway::ConnectionControl;
use crate::stickers::StickerCache;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info, warn};
use yamato_core::{
    config::AdminConfig, error::YamatoError, message::InboundMessage, traits::Session,
};
use yamato_memory::Store;
use yamato_plugins::{load_manifests, CommandManifest};

/// Compiled-in command implementations a manifest can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Help,
    Ping,
    Info,
    Stats,
    Restart,
    /// Random pick from the manifest's `replies`.
    Reply,
}

impl Handler {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "help" => Some(Self::Help),
            "ping" => Some(Self::Ping),
            "info" => Some(Self::Info),
            "stats" => Some(Self::Stats),
            "restart" => Some(Self::Restart),
            "reply" => Some(Self::Reply),
            _ => None,
        }
    }
}

/// A loaded command.
#[derive(Debug)]
pub struct Command {
    pub manifest: CommandManifest,
    pub handler: Handler,
}

/// Immutable name/alias → command mapping.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<Arc<Command>>,
    index: HashMap<String, Arc<Command>>,
}

impl CommandTable {
    /// Bind manifests to handlers. Unknown handlers are rejected; a name
    /// already taken keeps its first owner, and primary names win over aliases.
    pub fn build(manifests: Vec<CommandManifest>) -> Self {
        let mut commands = Vec::new();
        for manifest in manifests {
            let Some(handler) = Handler::from_name(&manifest.handler) else {
                error!(
                    "command '{}' references unknown handler '{}'",
                    manifest.name, manifest.handler
                );
                continue;
            };
            commands.push(Arc::new(Command { manifest, handler }));
        }

        let mut index: HashMap<String, Arc<Command>> = HashMap::new();
        let mut kept = Vec::new();
        for cmd in &commands {
            let name = cmd.manifest.name.to_lowercase();
            if index.contains_key(&name) {
                warn!("duplicate command '{name}' ignored");
                continue;
            }
            index.insert(name, Arc::clone(cmd));
            kept.push(Arc::clone(cmd));
        }
        for cmd in &kept {
            for alias in cmd.manifest.names().skip(1) {
                if let Some(owner) = index.get(&alias) {
                    if !Arc::ptr_eq(owner, cmd) {
                        warn!(
                            "alias '{alias}' of '{}' already used by '{}'",
                            cmd.manifest.name, owner.manifest.name
                        );
                    }
                    continue;
                }
                index.insert(alias, Arc::clone(cmd));
            }
        }

        Self {
            commands: kept,
            index,
        }
    }

    /// Case-insensitive lookup by name or alias.
    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        self.index.get(&name.to_lowercase()).cloned()
    }

    /// Number of distinct commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands grouped by category, both sorted.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&Command>> {
        let mut groups: BTreeMap<&str, Vec<&Command>> = BTreeMap::new();
        for cmd in &self.commands {
            groups
                .entry(cmd.manifest.category.as_str())
                .or_default()
                .push(cmd);
        }
        for list in groups.values_mut() {
            list.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        }
        groups
    }
}

/// Hot-reloadable command registry.
pub struct CommandRegistry {
    dir: PathBuf,
    table: RwLock<Arc<CommandTable>>,
}

impl CommandRegistry {
    /// An empty registry reading manifests from `dir`. Call [`load`](Self::load).
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            table: RwLock::new(Arc::new(CommandTable::default())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rebuild the table from disk and swap it in.
    ///
    /// When the directory cannot be read the current table stays in place.
    pub fn load(&self) -> Result<usize, YamatoError> {
        let report = load_manifests(&self.dir)?;
        let table = Arc::new(CommandTable::build(report.manifests));
        let count = table.len();
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = table;
        info!(
            "loaded {count} commands ({} rejected)",
            report.rejected.len()
        );
        Ok(count)
    }

    /// The current table.
    pub fn snapshot(&self) -> Arc<CommandTable> {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        self.snapshot().lookup(name)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }
}

/// Everything a handler may touch while running.
pub struct CommandContext<'a> {
    pub session: &'a dyn Session,
    pub message: &'a InboundMessage,
    pub args: &'a [String],
    /// Name the sender introduced themselves with, if remembered.
    pub speaker_name: Option<&'a str>,
    pub registry: &'a CommandRegistry,
    pub store: &'a Store,
    pub stickers: &'a StickerCache,
    pub connection: &'a dyn ConnectionControl,
    pub admin: &'a AdminConfig,
    pub prefix: &'a str,
    pub bot_name: &'a str,
    pub persona_name: &'a str,
    pub max_retries: u32,
    pub uptime: Duration,
}

impl CommandContext<'_> {
    /// Reply in the command's chat, quoting the command message.
    pub(crate) async fn reply(&self, text: &str) -> Result<(), YamatoError> {
        self.session
            .send_text(&self.message.chat_id, text, Some(self.message))
            .await
            .map(|_| ())
    }
}

/// Run `cmd` in `ctx`.
pub async fn execute(cmd: &Command, ctx: &CommandContext<'_>) -> Result<(), YamatoError> {
    match cmd.handler {
        Handler::Help => handlers::help(ctx).await,
        Handler::Ping => handlers::ping(ctx).await,
        Handler::Info => handlers::info(ctx).await,
        Handler::Stats => handlers::stats(ctx).await,
        Handler::Restart => handlers::restart(ctx).await,
        Handler::Reply => handlers::reply(cmd, ctx).await,
    }
}

/// `1d 2h 3m 4s`, omitting leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{secs}s"));
    out
}
