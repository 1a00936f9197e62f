mod defaults;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::YamatoError;
use defaults::*;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// Root for credentials, stickers, the store and logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Who the bot pretends to be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Name token that makes group messages eligible for a reply.
    #[serde(default = "default_persona_name")]
    pub name: String,
    /// Greeting words recognized in front of the persona name ("hey yamato").
    #[serde(default = "default_greetings")]
    pub greetings: Vec<String>,
    /// Character description placed at the top of every prompt.
    #[serde(default = "default_persona_prompt")]
    pub prompt: String,
    /// Replies used when the AI provider is unavailable or misbehaves.
    #[serde(default = "default_fallback_replies")]
    pub fallback_replies: Vec<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            greetings: default_greetings(),
            prompt: default_persona_prompt(),
            fallback_replies: default_fallback_replies(),
        }
    }
}

/// OpenAI-compatible completion endpoint (Groq by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Empty means "not configured"; the bot then answers with fallback replies.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: String::new(),
            model: default_provider_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Reconnection, health probe and QR pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_connection_attempts")]
    pub max_connection_attempts: u32,
    #[serde(default = "default_fresh_session_delay_ms")]
    pub fresh_session_delay_ms: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_qr_min_interval_secs")]
    pub qr_min_interval_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
            max_connection_attempts: default_max_connection_attempts(),
            fresh_session_delay_ms: default_fresh_session_delay_ms(),
            health_interval_secs: default_health_interval_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            qr_min_interval_secs: default_qr_min_interval_secs(),
        }
    }
}

/// Command plugin settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_command_prefix")]
    pub prefix: String,
    /// Manifest directory. Empty = `{data_dir}/commands`.
    #[serde(default)]
    pub dir: String,
    #[serde(default = "default_true")]
    pub watch: bool,
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: default_command_prefix(),
            dir: String::new(),
            watch: true,
            reload_debounce_ms: default_reload_debounce_ms(),
        }
    }
}

/// Phone numbers allowed to run admin-only commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub numbers: Vec<String>,
}

impl AdminConfig {
    /// Whether `number` (bare digits, no `@server`) belongs to an admin.
    pub fn is_admin(&self, number: &str) -> bool {
        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        !digits.is_empty()
            && self.numbers.iter().any(|n| {
                n.chars().filter(|c| c.is_ascii_digit()).collect::<String>() == digits
            })
    }
}

/// Status HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Config {
    fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.bot.data_dir))
    }

    /// Directory holding the transport's session credentials.
    pub fn auth_dir(&self) -> PathBuf {
        self.data_path().join("auth")
    }

    /// Directory scanned for `*.webp` stickers.
    pub fn stickers_dir(&self) -> PathBuf {
        self.data_path().join("stickers")
    }

    /// The JSON document store.
    pub fn store_path(&self) -> PathBuf {
        self.data_path().join("data").join("database.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_path().join("logs")
    }

    /// Command manifest directory.
    pub fn commands_dir(&self) -> PathBuf {
        if self.commands.dir.trim().is_empty() {
            self.data_path().join("commands")
        } else {
            PathBuf::from(shellexpand(&self.commands.dir))
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `GROQ_API_KEY`, `ADMIN_NUMBER` and `PORT` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GROQ_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.provider.api_key = key.trim().to_string();
        }
        if let Some(number) = lookup("ADMIN_NUMBER").filter(|v| !v.trim().is_empty()) {
            let number = number.trim().to_string();
            if !self.admin.numbers.contains(&number) {
                self.admin.numbers.push(number);
            }
        }
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => self.api.port = p,
                Err(_) => warn!("ignoring invalid PORT value: {port}"),
            }
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Environment overrides
/// are not applied here; call [`Config::apply_env`] afterwards.
pub fn load(path: &str) -> Result<Config, YamatoError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| YamatoError::Config(format!("failed to read {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| YamatoError::Config(format!("failed to parse config: {e}")))
}
