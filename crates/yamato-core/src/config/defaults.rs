//! Serde default functions for every configurable field.

pub fn default_bot_name() -> String {
    "Yamato Bot".to_string()
}
pub fn default_data_dir() -> String {
    "~/.yamato".to_string()
}
pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_persona_name() -> String {
    "Yamato".to_string()
}
pub fn default_greetings() -> Vec<String> {
    ["hey", "hi", "hello"].iter().map(|s| s.to_string()).collect()
}
pub fn default_persona_prompt() -> String {
    "You are Yamato from One Piece. You are savage, rude, give short replies, \
     and sometimes roast people. You shout \"I'm Kozuki Oden!\" sometimes."
        .to_string()
}
pub fn default_fallback_replies() -> Vec<String> {
    [
        "Huh? What do you want?",
        "I'm Kozuki Oden! Deal with it!",
        "Tch, whatever...",
        "You're annoying me.",
        "Shut up and leave me alone!",
        "What's your problem?",
        "I don't have time for this.",
        "Are you stupid or something?",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_provider_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
pub fn default_provider_model() -> String {
    "llama3-8b-8192".to_string()
}
pub fn default_temperature() -> f32 {
    0.7
}
pub fn default_max_tokens() -> u32 {
    150
}
pub fn default_provider_timeout_secs() -> u64 {
    10
}
pub fn default_max_attempts() -> u32 {
    3
}
pub fn default_retry_delay_ms() -> u64 {
    1000
}

pub fn default_base_delay_ms() -> u64 {
    3_000
}
pub fn default_max_delay_ms() -> u64 {
    60_000
}
pub fn default_max_retries() -> u32 {
    10
}
pub fn default_max_connection_attempts() -> u32 {
    50
}
pub fn default_fresh_session_delay_ms() -> u64 {
    10_000
}
pub fn default_health_interval_secs() -> u64 {
    30
}
pub fn default_connect_timeout_secs() -> u64 {
    90
}
pub fn default_qr_min_interval_secs() -> u64 {
    10
}

pub fn default_command_prefix() -> String {
    "/".to_string()
}
pub fn default_reload_debounce_ms() -> u64 {
    500
}

pub fn default_true() -> bool {
    true
}
pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}
pub fn default_api_port() -> u16 {
    3000
}
